//! End-to-end tests for the gateway.
//!
//! Each test starts the full router on an ephemeral port, with `wiremock`
//! servers standing in for the booking backend and the metadata server that
//! issues identity tokens.
//!
//! Run with: `cargo test --test integration_tests`
#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::time::Duration;

use booking_gateway::identity::IdentityFailurePolicy;
use booking_gateway::{AppState, Config, build_router};
use reqwest::header::HeaderValue;
use reqwest::{Client, StatusCode};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SERVICE_TOKEN: &str = "svc-identity-token";

/// Test fixture: mock backend, mock metadata server, running gateway.
struct TestFixture {
    backend: MockServer,
    identity: MockServer,
    base_url: String,
    client: Client,
}

impl TestFixture {
    async fn new() -> Self {
        Self::with_config(|config| config).await
    }

    /// Start the gateway with a config derived from the defaults.
    async fn with_config(customize: impl FnOnce(Config) -> Config) -> Self {
        let backend = MockServer::start().await;
        let identity = MockServer::start().await;

        let config = customize(Config {
            host: "127.0.0.1".to_string(),
            port: 0,
            backend_base_url: backend.uri(),
            service_identity_enabled: true,
            identity_token_url: format!("{}/identity", identity.uri()),
            metrics_port: 0,
            ..Config::default()
        });
        config.validate().expect("Invalid test configuration");

        let state = AppState::new(config).expect("Failed to build state");
        let app = build_router(state);

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to ephemeral port");
        let addr = listener.local_addr().expect("Failed to get local address");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("Server error");
        });

        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            backend,
            identity,
            base_url: format!("http://{addr}"),
            client,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn mount_identity(&self) {
        Mock::given(method("GET"))
            .and(path("/identity"))
            .and(query_param("audience", self.backend.uri()))
            .and(header("metadata-flavor", "Google"))
            .respond_with(ResponseTemplate::new(200).set_body_string(SERVICE_TOKEN))
            .mount(&self.identity)
            .await;
    }

    async fn backend_calls(&self) -> usize {
        self.backend.received_requests().await.unwrap().len()
    }

    async fn identity_calls(&self) -> usize {
        self.identity.received_requests().await.unwrap().len()
    }
}

// =============================================================================
// Health & Readiness
// =============================================================================

#[tokio::test]
async fn test_health_check() {
    let fixture = TestFixture::new().await;

    let response = fixture.client.get(fixture.url("/health")).send().await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["backend_url"], fixture.backend.uri());
    assert_eq!(body["service_identity"], true);
    assert!(body["version"].is_string());
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn test_readiness_follows_backend_health() {
    let fixture = TestFixture::new().await;

    let response = fixture.client.get(fixture.url("/ready")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    Mock::given(method("GET"))
        .and(path("/healthz"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "ok"})))
        .mount(&fixture.backend)
        .await;

    let response = fixture.client.get(fixture.url("/ready")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["backend_reachable"], true);
}

// =============================================================================
// Auth Path Selection
// =============================================================================

#[tokio::test]
async fn test_user_token_is_forwarded_verbatim() {
    let fixture = TestFixture::new().await;
    Mock::given(method("GET"))
        .and(path("/bookings"))
        .and(header("authorization", "Bearer abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": []})))
        .expect(1)
        .mount(&fixture.backend)
        .await;

    let response = fixture
        .client
        .get(fixture.url("/api/bookings"))
        .bearer_auth("abc")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.json::<Value>().await.unwrap(), json!({"items": []}));
    assert_eq!(fixture.identity_calls().await, 0);
}

#[tokio::test]
async fn test_non_ascii_user_header_still_takes_user_path() {
    let fixture = TestFixture::new().await;
    fixture.mount_identity().await;
    Mock::given(method("GET"))
        .and(path("/services"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&fixture.backend)
        .await;

    let response = fixture
        .client
        .get(fixture.url("/api/services"))
        .header(
            "authorization",
            HeaderValue::from_bytes(b"Bearer t\xe9st").unwrap(),
        )
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(fixture.identity_calls().await, 0);
    let requests = fixture.backend.received_requests().await.unwrap();
    let sent = requests.first().unwrap().headers.get("authorization").unwrap();
    assert_eq!(sent.as_bytes(), b"Bearer t\xe9st");
}

#[tokio::test]
async fn test_protected_route_without_token_is_401_and_never_forwarded() {
    let fixture = TestFixture::new().await;
    fixture.mount_identity().await;

    let response = fixture
        .client
        .post(fixture.url("/api/customers"))
        .json(&json!({"name": "Jane"}))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(response.headers()["www-authenticate"], "Bearer");
    assert_eq!(
        response.json::<Value>().await.unwrap(),
        json!({"detail": "Authentication required"})
    );
    assert_eq!(fixture.backend_calls().await, 0);
    assert_eq!(fixture.identity_calls().await, 0);
}

#[tokio::test]
async fn test_public_post_without_token_uses_service_identity() {
    let fixture = TestFixture::new().await;
    fixture.mount_identity().await;
    let booking = json!({"service_id": "oil-change", "slot": "2024-06-01T09:00:00Z"});
    Mock::given(method("POST"))
        .and(path("/bookings"))
        .and(header("authorization", format!("Bearer {SERVICE_TOKEN}").as_str()))
        .and(body_json(booking.clone()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "b-1"})))
        .expect(1)
        .mount(&fixture.backend)
        .await;

    let response = fixture
        .client
        .post(fixture.url("/api/bookings"))
        .json(&booking)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(response.json::<Value>().await.unwrap(), json!({"id": "b-1"}));
    assert_eq!(fixture.identity_calls().await, 1);
}

#[tokio::test]
async fn test_user_path_passes_backend_error_through() {
    let fixture = TestFixture::new().await;
    Mock::given(method("PUT"))
        .and(path("/vehicles/users/me/vehicles/v1"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({"detail": "forbidden"})))
        .mount(&fixture.backend)
        .await;

    let response = fixture
        .client
        .put(fixture.url("/api/vehicles/users/me/vehicles/v1"))
        .bearer_auth("abc")
        .json(&json!({"make": "Honda"}))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(
        response.json::<Value>().await.unwrap(),
        json!({"detail": "forbidden"})
    );
}

#[tokio::test]
async fn test_service_path_error_keeps_backend_status() {
    let fixture = TestFixture::new().await;
    fixture.mount_identity().await;
    Mock::given(method("GET"))
        .and(path("/services/unknown"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"detail": "Service not found"})))
        .mount(&fixture.backend)
        .await;

    let response = fixture
        .client
        .get(fixture.url("/api/services/unknown"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        response.json::<Value>().await.unwrap(),
        json!({"detail": "Service not found"})
    );
}

#[tokio::test]
async fn test_identity_failure_fails_request_by_default() {
    let fixture = TestFixture::new().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&fixture.identity)
        .await;

    let response = fixture
        .client
        .get(fixture.url("/api/services"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "service_identity_unavailable");
    assert_eq!(fixture.backend_calls().await, 0);
}

#[tokio::test]
async fn test_identity_failure_with_anonymous_policy_forwards_without_token() {
    let fixture = TestFixture::with_config(|config| Config {
        identity_failure_policy: IdentityFailurePolicy::Anonymous,
        ..config
    })
    .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&fixture.identity)
        .await;
    Mock::given(method("GET"))
        .and(path("/services"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": "oil-change"}])))
        .mount(&fixture.backend)
        .await;

    let response = fixture
        .client
        .get(fixture.url("/api/services"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let requests = fixture.backend.received_requests().await.unwrap();
    assert!(requests.first().unwrap().headers.get("authorization").is_none());
}

#[tokio::test]
async fn test_identity_disabled_forwards_without_token() {
    let fixture = TestFixture::with_config(|config| Config {
        service_identity_enabled: false,
        ..config
    })
    .await;
    Mock::given(method("GET"))
        .and(path("/availability"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&fixture.backend)
        .await;

    let response = fixture
        .client
        .get(fixture.url("/api/availability"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(fixture.identity_calls().await, 0);
}

// =============================================================================
// Request Shaping
// =============================================================================

#[tokio::test]
async fn test_unsupported_method_is_405() {
    let fixture = TestFixture::new().await;

    let response = fixture
        .client
        .patch(fixture.url("/api/bookings/b-1"))
        .bearer_auth("abc")
        .json(&json!({"status": "cancelled"}))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(response.headers()["allow"], "GET, POST, PUT, DELETE");
    assert_eq!(
        response.json::<Value>().await.unwrap(),
        json!({"detail": "Method PATCH Not Allowed"})
    );
    assert_eq!(fixture.backend_calls().await, 0);
}

#[tokio::test]
async fn test_get_query_parameters_are_forwarded() {
    let fixture = TestFixture::new().await;
    fixture.mount_identity().await;
    Mock::given(method("GET"))
        .and(path("/availability"))
        .and(query_param("date", "2024-06-01"))
        .and(query_param("service_id", "oil-change"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"slot": "09:00"}])))
        .expect(1)
        .mount(&fixture.backend)
        .await;

    let response = fixture
        .client
        .get(fixture.url("/api/availability"))
        .query(&[("date", "2024-06-01"), ("service_id", "oil-change")])
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_nested_path_maps_onto_backend_prefix() {
    let fixture = TestFixture::new().await;
    Mock::given(method("GET"))
        .and(path("/users/me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"email": "jane@example.com"})))
        .expect(1)
        .mount(&fixture.backend)
        .await;

    let response = fixture
        .client
        .get(fixture.url("/api/users/me"))
        .bearer_auth("abc")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_gateway_health_route_maps_to_backend_healthz() {
    let fixture = TestFixture::new().await;
    fixture.mount_identity().await;
    Mock::given(method("GET"))
        .and(path("/healthz"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "ok"})))
        .expect(1)
        .mount(&fixture.backend)
        .await;

    let response = fixture
        .client
        .get(fixture.url("/api/health"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.json::<Value>().await.unwrap(), json!({"status": "ok"}));
}

#[tokio::test]
async fn test_unsafe_path_is_rejected() {
    let fixture = TestFixture::new().await;

    let response = fixture
        .client
        .get(fixture.url("/api/services/a%5Cb"))
        .bearer_auth("abc")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(fixture.backend_calls().await, 0);
}

#[tokio::test]
async fn test_invalid_json_body_is_400() {
    let fixture = TestFixture::new().await;

    let response = fixture
        .client
        .post(fixture.url("/api/bookings"))
        .bearer_auth("abc")
        .header("content-type", "application/json")
        .body("{\"slot\": ")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "invalid_json");
    assert_eq!(fixture.backend_calls().await, 0);
}

#[tokio::test]
async fn test_oversized_body_is_rejected() {
    let fixture = TestFixture::with_config(|config| Config {
        max_request_body_size: 1024,
        ..config
    })
    .await;

    let response = fixture
        .client
        .post(fixture.url("/api/bookings"))
        .bearer_auth("abc")
        .json(&json!({"notes": "x".repeat(4096)}))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(response.headers()["content-type"], "application/json");
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "payload_too_large");
    assert!(body["detail"].is_string());
    assert_eq!(fixture.backend_calls().await, 0);
}

#[tokio::test]
async fn test_undecodable_path_is_json_400() {
    let fixture = TestFixture::new().await;

    let response = fixture
        .client
        .get(fixture.url("/api/services/%FF"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(response.headers()["content-type"], "application/json");
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "bad_request");
    assert!(body["detail"].is_string());
    assert_eq!(fixture.backend_calls().await, 0);
}

#[tokio::test]
async fn test_non_json_backend_body_becomes_placeholder() {
    let fixture = TestFixture::new().await;
    fixture.mount_identity().await;
    Mock::given(method("DELETE"))
        .and(path("/bookings/b-1"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&fixture.backend)
        .await;

    let response = fixture
        .client
        .delete(fixture.url("/api/bookings/b-1"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.json::<Value>().await.unwrap(),
        json!({"detail": "No response data or invalid JSON"})
    );
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let fixture = TestFixture::new().await;

    let response = fixture
        .client
        .get(fixture.url("/api/unknown"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "not_found");
    assert_eq!(body["detail"], "No route for /api/unknown");
    assert_eq!(fixture.backend_calls().await, 0);
}

// =============================================================================
// Request ID
// =============================================================================

#[tokio::test]
async fn test_request_id_is_propagated_to_backend_and_response() {
    let fixture = TestFixture::new().await;
    Mock::given(method("GET"))
        .and(path("/bookings"))
        .and(header("x-request-id", "corr-123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&fixture.backend)
        .await;

    let response = fixture
        .client
        .get(fixture.url("/api/bookings"))
        .bearer_auth("abc")
        .header("x-request-id", "corr-123")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-request-id"], "corr-123");
}

#[tokio::test]
async fn test_request_id_is_generated_when_missing() {
    let fixture = TestFixture::new().await;

    let response = fixture.client.get(fixture.url("/health")).send().await.unwrap();

    let id = response.headers()["x-request-id"].to_str().unwrap();
    assert!(uuid::Uuid::parse_str(id).is_ok());
}
