//! Health and readiness endpoints.
//!
//! - **Health** (`/health`): liveness of the gateway itself, always 200
//! - **Readiness** (`/ready`): 503 until the backend health endpoint answers

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use chrono::Utc;
use tracing::{instrument, warn};

use crate::models::{HealthResponse, ReadyResponse};
use crate::state::AppState;

/// Backend endpoint probed by the readiness check.
pub const BACKEND_HEALTH_ENDPOINT: &str = "/healthz";

/// Health check endpoint.
///
/// ```json
/// {
///   "status": "healthy",
///   "version": "0.1.0",
///   "backend_url": "https://booking-backend.example.com",
///   "service_identity": true,
///   "uptime_seconds": 3600,
///   "timestamp": "2024-01-15T10:30:00Z"
/// }
/// ```
#[instrument(skip(state))]
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        backend_url: state.config.backend_base_url.clone(),
        service_identity: state.forwarder.credentials().is_enabled(),
        uptime_seconds: state.uptime_seconds(),
        timestamp: Utc::now(),
    })
}

/// Readiness check endpoint.
///
/// Probes the backend without credentials, bounded by the default timeout.
///
/// ```yaml
/// readinessProbe:
///   httpGet:
///     path: /ready
///     port: 3000
/// ```
#[instrument(skip(state))]
pub async fn readiness_check(State(state): State<AppState>) -> (StatusCode, Json<ReadyResponse>) {
    let reachable = state
        .forwarder
        .backend()
        .probe(BACKEND_HEALTH_ENDPOINT, state.config.default_timeout)
        .await;

    if reachable {
        (
            StatusCode::OK,
            Json(ReadyResponse {
                status: "ready",
                backend_reachable: true,
            }),
        )
    } else {
        warn!("Backend health probe failed, reporting not ready");
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ReadyResponse {
                status: "unavailable",
                backend_reachable: false,
            }),
        )
    }
}
