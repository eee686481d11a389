//! Outbound side of the gateway: calls to the booking backend.
//!
//! # Module Structure
//!
//! - `client` - `BackendClient`, executes exactly one HTTP call per request
//! - `params` - `ForwardMethod` and `OutboundCall` describing that call
//! - `outcome` - `BackendResponse` / `NormalizedError` and body parsing
//!
//! # Normalization
//!
//! ```text
//!   transport failure ──► NormalizedError { status: None }
//!   timeout           ──► NormalizedError { status: 504, "timeout" }
//!   status ≥ 400      ──► NormalizedError { status, payload }
//!   otherwise         ──► BackendResponse { status, payload | placeholder }
//! ```
//!
//! A body that is empty or not JSON never fails a call; it becomes the
//! placeholder payload `{"detail": "No response data or invalid JSON"}`.

mod client;
mod outcome;
mod params;

pub use client::BackendClient;
pub use outcome::{
    BackendResponse, NormalizedError, PLACEHOLDER_DETAIL, TIMEOUT_STATUS, parse_payload,
    placeholder_payload,
};
pub use params::{ForwardMethod, OutboundCall};
