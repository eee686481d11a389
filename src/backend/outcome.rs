//! Normalized outcomes of a backend call.

use axum::http::StatusCode;
use serde_json::{Value, json};
use thiserror::Error;

/// Detail string of the placeholder payload.
pub const PLACEHOLDER_DETAIL: &str = "No response data or invalid JSON";

/// Status reported for a call that exceeded its timeout.
pub const TIMEOUT_STATUS: u16 = 504;

/// Payload used when the backend body is absent or not valid JSON.
pub fn placeholder_payload() -> Value {
    json!({ "detail": PLACEHOLDER_DETAIL })
}

/// Parse a response body as JSON, yielding `None` when it is empty or malformed.
///
/// Never fails: a malformed body is a recoverable condition.
pub fn parse_payload(bytes: &[u8]) -> Option<Value> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return None;
    }
    match serde_json::from_slice::<Value>(bytes) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::debug!(error = %e, len = bytes.len(), "Backend body is not valid JSON");
            None
        }
    }
}

/// Successful backend response.
#[derive(Debug, Clone, PartialEq)]
pub struct BackendResponse {
    /// Status the backend answered with
    pub status: StatusCode,
    /// Parsed body, or the placeholder payload
    pub payload: Value,
}

impl BackendResponse {
    pub fn new(status: StatusCode, payload: Option<Value>) -> Self {
        Self {
            status,
            payload: payload.unwrap_or_else(placeholder_payload),
        }
    }
}

/// A failed backend call.
///
/// Built in exactly one place (the backend client) from either a transport
/// failure or a response with status ≥ 400.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message}")]
pub struct NormalizedError {
    /// Status to report; `None` for transport failures
    pub status_code: Option<u16>,
    /// Human-readable description
    pub message: String,
    /// Backend body when it parsed as JSON
    pub payload: Option<Value>,
}

impl NormalizedError {
    /// The backend answered with an error status.
    pub fn from_status(status: StatusCode, payload: Option<Value>) -> Self {
        Self {
            status_code: Some(status.as_u16()),
            message: format!("Backend responded with status {status}"),
            payload,
        }
    }

    /// The call exceeded its timeout.
    pub fn timeout() -> Self {
        Self {
            status_code: Some(TIMEOUT_STATUS),
            message: "timeout".to_string(),
            payload: None,
        }
    }

    /// The backend could not be reached.
    pub fn transport(description: impl Into<String>) -> Self {
        Self {
            status_code: None,
            message: description.into(),
            payload: None,
        }
    }

    /// Classify a reqwest error.
    ///
    /// The message reaches clients, so it never carries the error text with
    /// its backend URL; the caller logs that.
    pub fn from_reqwest(e: &reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::timeout()
        } else if e.is_connect() {
            Self::transport("Backend unreachable")
        } else {
            Self::transport("Backend request failed")
        }
    }

    /// Status for the inbound response; 500 when absent or out of range.
    pub fn http_status(&self) -> StatusCode {
        self.status_code
            .and_then(|code| StatusCode::from_u16(code).ok())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self.status_code {
            None => "transport",
            Some(TIMEOUT_STATUS) if self.message == "timeout" => "timeout",
            Some(_) => "status",
        }
    }
}
