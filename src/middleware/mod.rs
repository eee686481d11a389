//! HTTP middleware.
//!
//! - **Request ID**: generation, validation and propagation of `X-Request-Id`
//!
//! CORS, tracing and body limits come from `tower-http` and are assembled in
//! [`crate::routes`].
//!
//! ```text
//! Request → Request ID → Trace → CORS → Body Limit → Handler → Response
//!                ↓
//!        X-Request-Id header (request, backend call, response)
//! ```

pub mod request_id;

pub use request_id::{MAX_REQUEST_ID_LENGTH, REQUEST_ID_HEADER, RequestIdLayer};
