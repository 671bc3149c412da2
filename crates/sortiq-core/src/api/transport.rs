//! HTTP transport seam.
//!
//! The pipeline only needs "send this request, give me status and body", so
//! the wire is hidden behind [`Transport`]. [`ReqwestTransport`] is the real
//! implementation; tests substitute a scripted one.

use std::fmt;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::{header, Client, Method};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use super::ApiError;

/// A request was sent but no response came back (connect failure, reset,
/// timeout, unreadable body).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct TransportError(pub String);

/// A request to the remote API, relative to the transport's base URL.
#[derive(Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
    /// Bearer token, set by the pipeline just before sending
    pub bearer: Option<String>,
}

impl fmt::Debug for ApiRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Bodies carry passwords and tokens
        f.debug_struct("ApiRequest")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("query", &self.query)
            .field("has_body", &self.body.is_some())
            .field("has_bearer", &self.bearer.is_some())
            .finish()
    }
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            bearer: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn json<B: Serialize + ?Sized>(mut self, body: &B) -> Result<Self, ApiError> {
        let value = serde_json::to_value(body)
            .map_err(|e| ApiError::Encode(format!("{} {}: {}", self.method, self.path, e)))?;
        self.body = Some(value);
        Ok(self)
    }

    pub(crate) fn with_bearer(&self, token: Option<&str>) -> Self {
        let mut request = self.clone();
        request.bearer = token.map(str::to_string);
        request
    }
}

/// Status and body of a received response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
}

impl ApiResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        serde_json::from_str(&self.body)
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse JSON response: {}", e)))
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError>;
}

/// Transport backed by a pooled reqwest client.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: Client,
    base_url: String,
}

impl ReqwestTransport {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
        let url = format!("{}{}", self.base_url, request.path);
        debug!(method = %request.method, url = %url, "Sending request");

        let mut builder = self
            .client
            .request(request.method.clone(), &url)
            .header(header::ACCEPT, "application/json");
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(ref token) = request.bearer {
            builder = builder.bearer_auth(token);
        }
        if let Some(ref body) = request.body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| TransportError(format!("{} {}: {}", request.method, url, e)))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| TransportError(format!("Failed to read response from {}: {}", url, e)))?;

        debug!(url = %url, status = status, "Received response");
        Ok(ApiResponse { status, body })
    }
}

#[cfg(test)]
pub(crate) mod mock {
    //! Scripted transport for pipeline and session tests.

    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use tokio::sync::Semaphore;

    use super::*;

    type Handler = dyn Fn(&ApiRequest) -> Result<ApiResponse, TransportError> + Send + Sync;

    /// Answers every request with a handler closure and records what was sent.
    /// Paths can be gated so their responses wait until the test releases them.
    pub(crate) struct MockTransport {
        handler: Box<Handler>,
        requests: Mutex<Vec<ApiRequest>>,
        gates: Mutex<HashMap<String, Arc<Semaphore>>>,
    }

    impl MockTransport {
        pub(crate) fn new<F>(handler: F) -> Arc<Self>
        where
            F: Fn(&ApiRequest) -> Result<ApiResponse, TransportError> + Send + Sync + 'static,
        {
            Arc::new(Self {
                handler: Box::new(handler),
                requests: Mutex::new(Vec::new()),
                gates: Mutex::new(HashMap::new()),
            })
        }

        /// Hold responses for `path` until [`Self::release`] is called.
        pub(crate) fn gate(&self, path: &str) {
            self.gates
                .lock()
                .unwrap()
                .insert(path.to_string(), Arc::new(Semaphore::new(0)));
        }

        pub(crate) fn release(&self, path: &str) {
            if let Some(gate) = self.gates.lock().unwrap().get(path) {
                gate.add_permits(1024);
            }
        }

        pub(crate) fn requests(&self) -> Vec<ApiRequest> {
            self.requests.lock().unwrap().clone()
        }

        pub(crate) fn count(&self, path: &str) -> usize {
            self.requests
                .lock()
                .unwrap()
                .iter()
                .filter(|r| r.path == path)
                .count()
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
            self.requests.lock().unwrap().push(request.clone());
            let gate = self.gates.lock().unwrap().get(&request.path).cloned();
            if let Some(gate) = gate {
                let _permit = gate.acquire().await.unwrap();
            }
            (self.handler)(&request)
        }
    }

    pub(crate) fn json(status: u16, value: Value) -> Result<ApiResponse, TransportError> {
        Ok(ApiResponse::new(status, value.to_string()))
    }

    pub(crate) fn unauthorized() -> Result<ApiResponse, TransportError> {
        json(401, serde_json::json!({ "detail": "Could not validate credentials" }))
    }

    pub(crate) fn offline() -> Result<ApiResponse, TransportError> {
        Err(TransportError("connection refused".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_builder() {
        let request = ApiRequest::patch("/api/tasks/3/status")
            .query("status", "completed")
            .json(&serde_json::json!({ "a": 1 }))
            .unwrap();
        assert_eq!(request.method, Method::PATCH);
        assert_eq!(request.query, vec![("status".to_string(), "completed".to_string())]);
        assert!(request.bearer.is_none());

        let signed = request.with_bearer(Some("A0"));
        assert_eq!(signed.bearer.as_deref(), Some("A0"));
        assert_eq!(signed.body, request.body);
    }

    #[test]
    fn test_debug_hides_secrets() {
        let request = ApiRequest::post("/api/auth/login")
            .json(&serde_json::json!({ "password": "hunter2" }))
            .unwrap()
            .with_bearer(Some("secret-token"));
        let rendered = format!("{:?}", request);
        assert!(!rendered.contains("hunter2"));
        assert!(!rendered.contains("secret-token"));
    }

    #[test]
    fn test_response_json_error() {
        let response = ApiResponse::new(200, "not json");
        assert!(response.is_success());
        let err = response.json::<Value>().unwrap_err();
        assert!(matches!(err, ApiError::InvalidResponse(_)));
    }

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        let transport =
            ReqwestTransport::new("http://localhost:8000/", Duration::from_secs(5)).unwrap();
        assert_eq!(transport.base_url(), "http://localhost:8000");
    }
}
