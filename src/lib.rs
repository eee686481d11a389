//! # Booking Gateway
//!
//! HTTP gateway between a browser front end and the booking backend. Every
//! proxied request is forwarded with exactly one credential:
//!
//! - the end user's bearer token, passed through unverified, or
//! - a service identity token minted by the hosting platform for the backend
//!   audience.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Axum HTTP Server                       │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Middleware (Request ID → Trace → CORS → Body Limit)        │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Handlers (health, proxy routes)                            │
//! ├─────────────────────────────────────────────────────────────┤
//! │  RequestForwarder (auth path selection, normalization)      │
//! ├──────────────────────────────┬──────────────────────────────┤
//! │  CredentialProvider          │  BackendClient               │
//! │  (user token / metadata      │  (one reqwest call,          │
//! │   server identity token)     │   timeout, error mapping)    │
//! └──────────────────────────────┴──────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use booking_gateway::{AppState, Config, build_router};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env()?;
//!     let state = AppState::new(config)?;
//!     let app = build_router(state);
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//!     axum::serve(listener, app).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Service Identity
//!
//! On Cloud Run identity minting is enabled automatically. Elsewhere:
//! ```bash
//! BACKEND_URL=https://backend.example.com SERVICE_IDENTITY_ENABLED=true cargo run
//! ```

pub mod backend;
pub mod config;
pub mod error;
pub mod forwarder;
pub mod handlers;
pub mod identity;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod state;
pub mod utils;
pub mod validation;

// Re-exports for convenience
pub use backend::BackendClient;
pub use config::{Config, LogFormat};
pub use error::{AppError, AppResult};
pub use forwarder::{ForwardOptions, InboundRequest, RequestForwarder};
pub use identity::CredentialProvider;
pub use routes::build_router;
pub use state::AppState;
