use serde_json::Value;
use thiserror::Error;

use crate::storage::StorageError;

/// Errors surfaced by the request pipeline.
///
/// Cloneable so one renewal failure can be handed to every queued caller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    /// The server rejected the request content (400/409/422)
    #[error("{message}")]
    Rejected { status: u16, message: String },

    #[error("Rate limited - please wait before retrying")]
    RateLimited,

    #[error("Server error: {0}")]
    ServerError(String),

    /// No response was received at all
    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Failed to encode request: {0}")]
    Encode(String),

    #[error("Session renewal failed: {0}")]
    RefreshFailed(String),

    #[error("Session renewal was abandoned before it completed")]
    RefreshAborted,

    #[error("Storage error: {0}")]
    Storage(String),

    /// Rejected locally, no request was sent
    #[error("{0}")]
    Validation(String),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

/// Fallback when the server gives no usable detail
const GENERIC_ERROR_MESSAGE: &str = "An error occurred";

impl From<StorageError> for ApiError {
    fn from(e: StorageError) -> Self {
        ApiError::Storage(e.to_string())
    }
}

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
        }
    }

    pub fn from_status(status: u16, body: &str) -> Self {
        let message = detail_message(body).unwrap_or_else(|| Self::truncate_body(body));
        match status {
            401 => ApiError::Unauthorized(message),
            403 => ApiError::AccessDenied(message),
            404 => ApiError::NotFound(message),
            400 | 409 | 422 => ApiError::Rejected { status, message },
            429 => ApiError::RateLimited,
            500..=599 => ApiError::ServerError(message),
            _ => ApiError::InvalidResponse(format!("Status {}: {}", status, message)),
        }
    }

    /// A 401 from the server, or a failed renewal that one caused.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized(_) | ApiError::RefreshFailed(_))
    }

    /// Text suitable for showing to a user.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Unauthorized(m)
            | ApiError::AccessDenied(m)
            | ApiError::NotFound(m)
            | ApiError::ServerError(m)
            | ApiError::Validation(m)
            | ApiError::Rejected { message: m, .. }
                if !m.is_empty() =>
            {
                m.clone()
            }
            // The server answered without a usable detail
            ApiError::Unauthorized(_)
            | ApiError::AccessDenied(_)
            | ApiError::NotFound(_)
            | ApiError::ServerError(_)
            | ApiError::Validation(_)
            | ApiError::Rejected { .. } => GENERIC_ERROR_MESSAGE.to_string(),
            ApiError::Network(_) => "Unable to reach the server".to_string(),
            _ => self.to_string(),
        }
    }
}

/// Flatten a FastAPI-style `{"detail": ...}` error body into one line.
///
/// - a string detail is returned as is
/// - a list of `{loc, msg}` items becomes `"loc.path - msg"` joined by `", "`
/// - an object with `msg` yields the msg
pub fn detail_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    match value.get("detail")? {
        Value::String(s) => Some(s.clone()),
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().map(validation_item).collect();
            if parts.is_empty() {
                None
            } else {
                Some(parts.join(", "))
            }
        }
        Value::Object(obj) => obj
            .get("msg")
            .and_then(Value::as_str)
            .map(str::to_string),
        _ => None,
    }
}

fn validation_item(item: &Value) -> String {
    match item {
        Value::String(s) => s.clone(),
        Value::Object(obj) => match obj.get("msg").and_then(Value::as_str) {
            Some(msg) => {
                let loc = obj
                    .get("loc")
                    .and_then(Value::as_array)
                    .map(|parts| {
                        parts
                            .iter()
                            .map(|p| match p {
                                Value::String(s) => s.clone(),
                                other => other.to_string(),
                            })
                            .collect::<Vec<_>>()
                            .join(".")
                    })
                    .unwrap_or_default();
                format!("{} - {}", loc, msg)
            }
            None => item.to_string(),
        },
        other => other.to_string(),
    }
}
