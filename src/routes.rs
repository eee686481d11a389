//! Application routing configuration with middleware stack.
//!
//! # Middleware Stack (applied in order)
//!
//! ```text
//! Request
//!    │
//!    ▼
//! ┌──────────────────┐
//! │   Request ID     │ ← Adds X-Request-Id header
//! └────────┬─────────┘
//!          │
//!          ▼
//! ┌──────────────────┐
//! │     Tracing      │ ← HTTP request/response logging
//! └────────┬─────────┘
//!          │
//!          ▼
//! ┌──────────────────┐
//! │      CORS        │ ← Cross-origin headers, preflight
//! └────────┬─────────┘
//!          │
//!          ▼
//! ┌──────────────────┐
//! │   Body Limit     │ ← 413 if exceeded
//! └────────┬─────────┘
//!          │
//!          ▼
//!      Handler
//! ```
//!
//! # Route Groups
//!
//! - `/health`, `/ready` - Gateway health & readiness
//! - `{API_PREFIX}/{resource}` and `{API_PREFIX}/{resource}/{*rest}` - Proxied
//!   backend resources, see [`PROXY_ROUTES`]

use axum::extract::DefaultBodyLimit;
use axum::http::HeaderValue;
use axum::routing::{any, get};
use axum::{Extension, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::handlers;
use crate::middleware::RequestIdLayer;
use crate::state::AppState;

/// One proxied backend resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProxyRoute {
    /// Inbound path below the API prefix
    pub inbound: &'static str,
    /// Backend endpoint prefix
    pub backend: &'static str,
    /// Whether a user token is mandatory
    pub require_auth: bool,
}

impl ProxyRoute {
    const fn public(inbound: &'static str, backend: &'static str) -> Self {
        Self {
            inbound,
            backend,
            require_auth: false,
        }
    }

    const fn protected(inbound: &'static str, backend: &'static str) -> Self {
        Self {
            inbound,
            backend,
            require_auth: true,
        }
    }
}

/// Backend resources exposed through the gateway.
pub const PROXY_ROUTES: &[ProxyRoute] = &[
    ProxyRoute::public("/health", "/healthz"),
    ProxyRoute::public("/services", "/services"),
    ProxyRoute::public("/availability", "/availability"),
    ProxyRoute::public("/bookings", "/bookings"),
    ProxyRoute::public("/vehicles", "/vehicles"),
    ProxyRoute::protected("/users", "/users"),
    ProxyRoute::protected("/customers", "/customers"),
    ProxyRoute::protected("/mechanic", "/mechanic"),
    ProxyRoute::protected("/workorders", "/workorders"),
    ProxyRoute::protected("/admin", "/admin"),
];

/// Build the application router with all routes and middleware configured.
///
/// Every HTTP method is routed to the forwarder so that unsupported ones get
/// the gateway's own 405 response rather than axum's default.
pub fn build_router(state: AppState) -> Router {
    let config = &state.config;

    // =========================================================================
    // CORS Configuration
    // =========================================================================
    let cors = build_cors_layer(&config.cors_allowed_origins);

    // =========================================================================
    // Build Router with Routes
    // =========================================================================
    let mut router = Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check));

    for route in PROXY_ROUTES {
        let path = format!("{}{}", config.api_prefix, route.inbound);
        router = router
            .route(&path, any(handlers::forward_root).layer(Extension(*route)))
            .route(
                &format!("{path}/{{*rest}}"),
                any(handlers::forward_nested).layer(Extension(*route)),
            );
    }
    router = router.fallback(handlers::not_found);
    info!(
        prefix = %config.api_prefix,
        routes = PROXY_ROUTES.len(),
        "Proxy routes mounted"
    );

    // =========================================================================
    // Apply Middleware Stack (order matters - applied bottom to top)
    // =========================================================================

    // 1. Request body size limit
    info!(
        max_size_kb = config.max_request_body_size / 1024,
        "Request body size limit configured"
    );
    router = router.layer(DefaultBodyLimit::max(config.max_request_body_size));

    // 2. CORS
    router = router.layer(cors);

    // 3. Tracing
    router = router.layer(TraceLayer::new_for_http());

    // 4. Request ID - outermost, so every log line and response carries it
    router = router.layer(RequestIdLayer::new());

    router.with_state(state)
}

/// Build CORS layer from configuration.
///
/// `["*"]` allows any origin. Origins that are not valid header values are
/// skipped with a warning.
fn build_cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let allow_any = allowed_origins.iter().any(|o| o == "*");

    if allow_any {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<HeaderValue> = allowed_origins
            .iter()
            .filter_map(|o| match o.parse() {
                Ok(origin) => Some(origin),
                Err(_) => {
                    warn!(origin = %o, "Ignoring invalid CORS origin");
                    None
                }
            })
            .collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_cors_layer_any() {
        let origins = vec!["*".to_string()];
        let _layer = build_cors_layer(&origins);
    }

    #[test]
    fn test_build_cors_layer_specific() {
        let origins = vec![
            "https://example.com".to_string(),
            "not a header\nvalue".to_string(),
        ];
        let _layer = build_cors_layer(&origins);
    }

    #[test]
    fn test_route_table_is_consistent() {
        for route in PROXY_ROUTES {
            assert!(route.inbound.starts_with('/'), "{route:?}");
            assert!(route.backend.starts_with('/'), "{route:?}");
            assert!(!route.inbound.ends_with('/'), "{route:?}");
        }

        let mut inbound: Vec<_> = PROXY_ROUTES.iter().map(|r| r.inbound).collect();
        inbound.sort_unstable();
        inbound.dedup();
        assert_eq!(inbound.len(), PROXY_ROUTES.len());
    }

    #[test]
    fn test_account_routes_require_auth() {
        let protected: Vec<_> = PROXY_ROUTES
            .iter()
            .filter(|r| r.require_auth)
            .map(|r| r.inbound)
            .collect();
        assert_eq!(
            protected,
            ["/users", "/customers", "/mechanic", "/workorders", "/admin"]
        );
    }
}
