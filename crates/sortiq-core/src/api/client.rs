//! Authenticated request pipeline for the SortIQ REST API.
//!
//! Every call to the remote API goes through [`ApiClient::execute`], which
//! attaches the stored access token and, on a 401, renews the credential once
//! and replays the call. Renewal is single-flight: while one is in progress,
//! other callers that hit a 401 queue up and share its outcome.

use std::sync::{Arc, Mutex, MutexGuard};

use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::auth::{CredentialStore, SessionEvent, SessionEvents};
use crate::models::{RefreshRequest, RefreshResponse};

use super::transport::{ApiRequest, ApiResponse, Transport};
use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// Account creation
pub const SIGNUP_PATH: &str = "/api/auth/signup";

/// Email/password sign-in
pub const LOGIN_PATH: &str = "/api/auth/login";

/// Exchange a refresh token for a new access token
pub const REFRESH_PATH: &str = "/api/auth/refresh";

/// Profile of the bearer of the access token
pub const ME_PATH: &str = "/api/users/me";

const HTTP_UNAUTHORIZED: u16 = 401;

type Waiter = oneshot::Sender<Result<String, ApiError>>;

/// Renewal state. The waiter list only exists while a renewal is in flight,
/// so a queued caller can never be left behind by an idle flag.
#[derive(Debug, Default)]
enum RefreshState {
    #[default]
    Idle,
    Refreshing(Vec<Waiter>),
}

/// Resets the renewal state when the leading caller finishes, or when its
/// future is dropped mid-renewal. Dropped waiters observe `RefreshAborted`.
struct RefreshGuard<'a> {
    state: &'a Mutex<RefreshState>,
    finished: bool,
}

impl RefreshGuard<'_> {
    fn finish(mut self, outcome: &Result<String, ApiError>) {
        self.finished = true;
        let waiters = take_waiters(self.state);
        debug!(queued = waiters.len(), ok = outcome.is_ok(), "Draining renewal queue");
        for waiter in waiters {
            // A waiter whose caller went away is fine to skip
            let _ = waiter.send(outcome.clone());
        }
    }
}

impl Drop for RefreshGuard<'_> {
    fn drop(&mut self) {
        if !self.finished {
            let waiters = take_waiters(self.state);
            warn!(queued = waiters.len(), "Session renewal abandoned");
        }
    }
}

fn lock_state(state: &Mutex<RefreshState>) -> MutexGuard<'_, RefreshState> {
    state.lock().unwrap_or_else(|e| e.into_inner())
}

fn take_waiters(state: &Mutex<RefreshState>) -> Vec<Waiter> {
    match std::mem::take(&mut *lock_state(state)) {
        RefreshState::Refreshing(waiters) => waiters,
        RefreshState::Idle => Vec::new(),
    }
}

/// API client for SortIQ.
/// Clone is cheap: the transport, storage and renewal state are shared.
#[derive(Clone)]
pub struct ApiClient {
    transport: Arc<dyn Transport>,
    credentials: CredentialStore,
    refresh: Arc<Mutex<RefreshState>>,
    events: SessionEvents,
}

impl ApiClient {
    pub fn new(transport: Arc<dyn Transport>, credentials: CredentialStore) -> Self {
        Self {
            transport,
            credentials,
            refresh: Arc::new(Mutex::new(RefreshState::Idle)),
            events: SessionEvents::new(),
        }
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    pub fn events(&self) -> &SessionEvents {
        &self.events
    }

    /// Whether a renewal is currently in flight
    pub fn is_refreshing(&self) -> bool {
        matches!(*lock_state(&self.refresh), RefreshState::Refreshing(_))
    }

    /// Number of callers waiting on the in-flight renewal
    pub fn queued_requests(&self) -> usize {
        match &*lock_state(&self.refresh) {
            RefreshState::Refreshing(waiters) => waiters.len(),
            RefreshState::Idle => 0,
        }
    }

    // ===== Pipeline =====

    /// Send a request with the current credential, renewing it once on a 401.
    ///
    /// Non-401 failures are returned as they are. A 401 on the replayed
    /// request is final.
    pub async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        let sent_token = self.credentials.access_token()?;
        let response = self.send(&request, sent_token.as_deref()).await?;
        if response.status != HTTP_UNAUTHORIZED {
            return Self::check_response(response);
        }

        debug!(path = %request.path, "Received 401, renewing credential");
        let token = match self.credentials.access_token()? {
            // Someone renewed while this request was in flight
            Some(current) if sent_token.as_deref() != Some(current.as_str()) => {
                debug!(path = %request.path, "Credential already renewed, replaying");
                current
            }
            Some(_) => self.renew().await?,
            // Signed out or torn down while in flight; nothing left to renew
            None => {
                debug!(path = %request.path, "No session to renew");
                return Self::check_response(response);
            }
        };

        let replay = self.send(&request, Some(&token)).await?;
        if replay.status == HTTP_UNAUTHORIZED {
            warn!(path = %request.path, "Request still unauthorized after renewal");
        }
        Self::check_response(replay)
    }

    /// Send a request without a credential and without renewal. Used for the
    /// sign-in, sign-up and refresh endpoints, where a 401 means bad input.
    pub async fn execute_public(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        let response = self.send(&request, None).await?;
        Self::check_response(response)
    }

    async fn send(&self, request: &ApiRequest, token: Option<&str>) -> Result<ApiResponse, ApiError> {
        self.transport
            .send(request.with_bearer(token))
            .await
            .map_err(|e| ApiError::Network(e.to_string()))
    }

    /// Check if response is successful, returning an error with body if not.
    fn check_response(response: ApiResponse) -> Result<ApiResponse, ApiError> {
        if response.is_success() {
            Ok(response)
        } else {
            Err(ApiError::from_status(response.status, &response.body))
        }
    }

    // ===== Renewal =====

    /// Obtain a fresh access token, joining an in-flight renewal if there is one.
    async fn renew(&self) -> Result<String, ApiError> {
        let queued = {
            let mut state = lock_state(&self.refresh);
            match &mut *state {
                RefreshState::Refreshing(waiters) => {
                    let (tx, rx) = oneshot::channel();
                    waiters.push(tx);
                    Some(rx)
                }
                RefreshState::Idle => {
                    *state = RefreshState::Refreshing(Vec::new());
                    None
                }
            }
        };

        if let Some(rx) = queued {
            debug!("Renewal already in flight, queueing request");
            return rx.await.unwrap_or(Err(ApiError::RefreshAborted));
        }

        let guard = RefreshGuard {
            state: &self.refresh,
            finished: false,
        };
        let outcome = self.refresh_credential().await;
        if let Err(ref e) = outcome {
            self.teardown(e);
        }
        guard.finish(&outcome);
        outcome
    }

    async fn refresh_credential(&self) -> Result<String, ApiError> {
        let refresh_token = self
            .credentials
            .refresh_token()?
            .ok_or_else(|| ApiError::RefreshFailed("No refresh token available".to_string()))?;

        let request = ApiRequest::post(REFRESH_PATH).json(&RefreshRequest {
            token: &refresh_token,
        })?;

        let response = self
            .execute_public(request)
            .await
            .map_err(|e| ApiError::RefreshFailed(e.user_message()))?;

        let body: RefreshResponse = response
            .json()
            .map_err(|_| ApiError::RefreshFailed("Invalid response format from server".to_string()))?;
        let access_token = body
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ApiError::RefreshFailed("Invalid response format from server".to_string()))?;

        self.credentials
            .update_tokens(&access_token, body.refresh_token.as_deref())?;
        if let Some(ref user) = body.user {
            self.credentials.store_user(user)?;
        }

        info!("Session renewed");
        self.events.emit(SessionEvent::Refreshed { user: body.user });
        Ok(access_token)
    }

    /// Tear the session down after a failed renewal, whatever the cause.
    fn teardown(&self, error: &ApiError) {
        warn!(error = %error, "Session renewal failed, signing out");
        if let Err(e) = self.credentials.clear() {
            warn!(error = %e, "Failed to clear stored session");
        }
        self.events.emit(SessionEvent::Expired);
    }

    // ===== Typed helpers =====

    pub(crate) async fn request_json<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T, ApiError> {
        self.execute(request).await?.json()
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.request_json(ApiRequest::get(path)).await
    }

    pub async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        self.request_json(ApiRequest::post(path).json(body)?).await
    }

    pub async fn put<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        self.request_json(ApiRequest::put(path).json(body)?).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.request_json(ApiRequest::delete(path)).await
    }
}
