//! Proxy handlers: hand inbound requests to the forwarder.
//!
//! Each mounted [`ProxyRoute`] is attached as a request extension, so one
//! pair of handlers serves the whole route table:
//!
//! - `{prefix}/bookings` → [`forward_root`] → backend `/bookings`
//! - `{prefix}/bookings/{*rest}` → [`forward_nested`] → backend `/bookings/{rest}`
//!
//! Extractors are taken as `Result`s so their rejections (bad percent
//! encoding, oversized bodies) are reported as [`AppError`] JSON.

use std::collections::BTreeMap;

use axum::Extension;
use axum::body::Bytes;
use axum::extract::rejection::{BytesRejection, PathRejection, QueryRejection};
use axum::extract::{OriginalUri, Path, Query, State};
use axum::http::{HeaderMap, Method};
use tracing::instrument;

use crate::error::{AppError, AppResult};
use crate::forwarder::{ForwardOptions, ForwardResponse, InboundRequest};
use crate::routes::ProxyRoute;
use crate::state::AppState;

/// Forward a request addressed to a route's root.
#[instrument(skip_all, fields(route = route.inbound, method = %method))]
pub async fn forward_root(
    State(state): State<AppState>,
    Extension(route): Extension<ProxyRoute>,
    method: Method,
    query: Result<Query<BTreeMap<String, String>>, QueryRejection>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> AppResult<ForwardResponse> {
    let Query(query) = query?;
    let endpoint = route.backend.to_string();
    forward(&state, route, endpoint, method, query, headers, body?).await
}

/// Forward a request addressed below a route's root.
#[instrument(skip_all, fields(route = route.inbound, method = %method))]
pub async fn forward_nested(
    State(state): State<AppState>,
    Extension(route): Extension<ProxyRoute>,
    method: Method,
    rest: Result<Path<String>, PathRejection>,
    query: Result<Query<BTreeMap<String, String>>, QueryRejection>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> AppResult<ForwardResponse> {
    let Path(rest) = rest?;
    let Query(query) = query?;
    let endpoint = format!("{}/{rest}", route.backend);
    forward(&state, route, endpoint, method, query, headers, body?).await
}

/// Answer requests that match no route.
pub async fn not_found(OriginalUri(uri): OriginalUri) -> AppError {
    AppError::NotFound(uri.path().to_string())
}

async fn forward(
    state: &AppState,
    route: ProxyRoute,
    endpoint: String,
    method: Method,
    query: BTreeMap<String, String>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<ForwardResponse> {
    let opts = ForwardOptions::new(state.config.timeout_for(&method))
        .with_require_auth(route.require_auth);

    let request = InboundRequest::new(method, endpoint)
        .with_query(query)
        .with_headers(headers)
        .with_body(body)
        .with_route(route.inbound);

    state.forwarder.forward(&request, &opts).await
}
