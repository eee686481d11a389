use axum::extract::rejection::{BytesRejection, PathRejection, QueryRejection};
use axum::http::header::{ALLOW, WWW_AUTHENTICATE};
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

use crate::backend::NormalizedError;
use crate::identity::AuthError;

/// Methods the gateway forwards, in the order advertised by the `Allow` header.
pub const ALLOWED_METHODS: &str = "GET, POST, PUT, DELETE";

/// Application-wide error type with HTTP status mapping.
///
/// Every failure of a forwarding operation ends up here and is converted to
/// a JSON response at the handler boundary.
///
/// # Backend Errors
///
/// `Backend` wraps the [`NormalizedError`] built by the backend client. Its
/// status code and payload are passed through to the caller; a transport
/// failure without a status code is reported as 500.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Method {0} Not Allowed")]
    MethodNotAllowed(String),

    #[error("Authentication required")]
    AuthenticationRequired,

    #[error("Backend request failed: {0}")]
    Backend(#[from] NormalizedError),

    #[error("Service identity unavailable: {0}")]
    ServiceIdentity(#[from] AuthError),

    #[error("Invalid JSON body: {0}")]
    InvalidBody(#[from] serde_json::Error),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Request body too large: {0}")]
    PayloadTooLarge(String),

    #[error("No route for {0}")]
    NotFound(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Error response body.
///
/// `error` is a machine-readable kind and is omitted for the two contract
/// responses (401, 405) whose body is exactly `{"detail": ...}`.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'static str>,
    pub detail: String,
}

impl ErrorBody {
    /// Body carrying only a `detail` string.
    pub fn detail(detail: impl Into<String>) -> Self {
        Self {
            error: None,
            detail: detail.into(),
        }
    }

    /// Body carrying an error kind and a `detail` string.
    pub fn kind(error: &'static str, detail: impl Into<String>) -> Self {
        Self {
            error: Some(error),
            detail: detail.into(),
        }
    }
}

impl AppError {
    /// HTTP status this error is reported with.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            AppError::AuthenticationRequired => StatusCode::UNAUTHORIZED,
            AppError::Backend(e) => e.http_status(),
            AppError::InvalidBody(_) | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::ServiceIdentity(_) | AppError::Internal(_) | AppError::ConfigError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Full details stay in the server log; clients get the sanitized body
        if status.is_server_error() {
            tracing::error!(error = %self, status = status.as_u16(), "Request failed");
        } else {
            tracing::warn!(error = %self, status = status.as_u16(), "Request rejected");
        }

        match self {
            AppError::MethodNotAllowed(method) => {
                let mut response = (
                    status,
                    axum::Json(ErrorBody::detail(format!("Method {method} Not Allowed"))),
                )
                    .into_response();
                response
                    .headers_mut()
                    .insert(ALLOW, HeaderValue::from_static(ALLOWED_METHODS));
                response
            }
            AppError::AuthenticationRequired => {
                let mut response =
                    (status, axum::Json(ErrorBody::detail("Authentication required")))
                        .into_response();
                response
                    .headers_mut()
                    .insert(WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
                response
            }
            AppError::Backend(e) => match e.payload {
                Some(payload) => (status, axum::Json(payload)).into_response(),
                None => (
                    status,
                    axum::Json(ErrorBody::kind("backend_error", e.message)),
                )
                    .into_response(),
            },
            AppError::ServiceIdentity(_) => (
                status,
                axum::Json(ErrorBody::kind(
                    "service_identity_unavailable",
                    "Unable to obtain a service identity token for the backend.",
                )),
            )
                .into_response(),
            AppError::InvalidBody(e) => (
                status,
                axum::Json(ErrorBody::kind("invalid_json", sanitize_json_error(&e))),
            )
                .into_response(),
            AppError::BadRequest(msg) => {
                (status, axum::Json(ErrorBody::kind("bad_request", msg))).into_response()
            }
            AppError::PayloadTooLarge(msg) => {
                (status, axum::Json(ErrorBody::kind("payload_too_large", msg))).into_response()
            }
            AppError::NotFound(path) => (
                status,
                axum::Json(ErrorBody::kind("not_found", format!("No route for {path}"))),
            )
                .into_response(),
            AppError::Internal(_) => (
                status,
                axum::Json(ErrorBody::kind(
                    "internal_error",
                    "An internal error occurred. Please contact support if the issue persists.",
                )),
            )
                .into_response(),
            AppError::ConfigError(_) => (
                status,
                axum::Json(ErrorBody::kind(
                    "config_error",
                    "Gateway configuration error. Please contact support.",
                )),
            )
                .into_response(),
        }
    }
}

// Extractor rejections would otherwise reach clients as text/plain

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<BytesRejection> for AppError {
    fn from(rejection: BytesRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            AppError::PayloadTooLarge("Request body exceeds the configured limit".to_string())
        } else {
            AppError::BadRequest(rejection.body_text())
        }
    }
}

/// Reduce a serde_json parse error to a message safe to show to clients.
///
/// Parse errors of a free-form `Value` only ever describe syntax, so the
/// position is kept and everything else is collapsed to a category.
fn sanitize_json_error(e: &serde_json::Error) -> String {
    use serde_json::error::Category;

    match e.classify() {
        Category::Eof => "Request body ended unexpectedly".to_string(),
        Category::Syntax => format!(
            "Malformed JSON in request body at line {} column {}",
            e.line(),
            e.column()
        ),
        Category::Data | Category::Io => "Invalid request body".to_string(),
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;
