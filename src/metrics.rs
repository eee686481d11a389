//! Prometheus metrics for the gateway.
//!
//! Metrics are exposed on a dedicated listener (default `0.0.0.0:9090`),
//! separate from the public router.
//!
//! # Available Metrics
//!
//! ## Counters
//! - `gateway_forward_requests_total` - Forwarding operations (labels: route, method, auth_path, status)
//! - `gateway_identity_mints_total` - Service identity token requests (label: outcome)
//! - `gateway_backend_failures_total` - Failed backend calls (label: kind)
//!
//! ## Histograms
//! - `gateway_forward_duration_seconds` - End-to-end forwarding latency (labels: route, method, auth_path)
//!
//! Label values are bounded: routes come from the static route table and
//! methods are restricted to the forwarded set, with `other` for the rest.
//! Requests rejected before an auth path is chosen carry `auth_path="none"`.

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing::{error, info};

/// Metric names as constants for consistency.
pub mod names {
    pub const FORWARD_REQUESTS_TOTAL: &str = "gateway_forward_requests_total";
    pub const FORWARD_DURATION_SECONDS: &str = "gateway_forward_duration_seconds";
    pub const IDENTITY_MINTS_TOTAL: &str = "gateway_identity_mints_total";
    pub const BACKEND_FAILURES_TOTAL: &str = "gateway_backend_failures_total";
}

/// Install the Prometheus exporter and describe all metrics.
///
/// # Errors
///
/// Fails if a recorder is already installed or the listener cannot bind.
pub fn init_metrics(metrics_addr: SocketAddr) -> Result<(), String> {
    PrometheusBuilder::new()
        .with_http_listener(metrics_addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {e}"))?;

    describe_counter!(
        names::FORWARD_REQUESTS_TOTAL,
        "Total number of forwarding operations by outcome"
    );
    describe_counter!(
        names::IDENTITY_MINTS_TOTAL,
        "Total number of service identity token requests by outcome"
    );
    describe_counter!(
        names::BACKEND_FAILURES_TOTAL,
        "Total number of failed backend calls by failure kind"
    );
    describe_histogram!(
        names::FORWARD_DURATION_SECONDS,
        "Forwarding operation duration in seconds"
    );

    info!(addr = %metrics_addr, "Prometheus metrics endpoint started");
    Ok(())
}

/// Try to initialize metrics, logging any errors but not failing.
pub fn try_init_metrics(metrics_addr: SocketAddr) {
    if let Err(e) = init_metrics(metrics_addr) {
        error!(error = %e, "Failed to initialize metrics, continuing without metrics");
    }
}

/// Record one completed forwarding operation.
pub fn record_forward(route: &'static str, method: &'static str, auth_path: &'static str, status: u16) {
    counter!(
        names::FORWARD_REQUESTS_TOTAL,
        "route" => route,
        "method" => method,
        "auth_path" => auth_path,
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record forwarding latency.
pub fn record_forward_duration(
    route: &'static str,
    method: &'static str,
    auth_path: &'static str,
    duration_secs: f64,
) {
    histogram!(
        names::FORWARD_DURATION_SECONDS,
        "route" => route,
        "method" => method,
        "auth_path" => auth_path
    )
    .record(duration_secs);
}

/// Record the outcome of a service identity mint (`success`, `disabled`, or an error kind).
pub fn record_identity_mint(outcome: &'static str) {
    counter!(names::IDENTITY_MINTS_TOTAL, "outcome" => outcome).increment(1);
}

/// Record a failed backend call (`transport`, `timeout` or `status`).
pub fn record_backend_failure(kind: &'static str) {
    counter!(names::BACKEND_FAILURES_TOTAL, "kind" => kind).increment(1);
}
