use chrono::{DateTime, Utc};
use serde::Serialize;

/// Gateway health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Always `"healthy"` while the process serves requests
    pub status: &'static str,
    /// Gateway version
    pub version: &'static str,
    /// Backend the gateway forwards to
    pub backend_url: String,
    /// Whether service identity tokens are minted
    pub service_identity: bool,
    /// Seconds since start-up
    pub uptime_seconds: u64,
    pub timestamp: DateTime<Utc>,
}

/// Readiness probe response.
#[derive(Debug, Serialize)]
pub struct ReadyResponse {
    /// `"ready"` or `"unavailable"`
    pub status: &'static str,
    /// Whether the backend health endpoint answered 2xx
    pub backend_reachable: bool,
}
