//! HTTP client for the booking backend.

use std::time::{Duration, Instant};

use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, RequestBuilder};
use tracing::{debug, instrument, warn};

use super::outcome::{BackendResponse, NormalizedError, parse_payload};
use super::params::OutboundCall;
use crate::identity::IdentityProof;
use crate::metrics;
use crate::middleware::REQUEST_ID_HEADER;

/// Client for the backend service.
///
/// Cheap to clone: the underlying `reqwest::Client` is reference counted.
/// The client never mints credentials itself; callers pass the proof to
/// attach.
#[derive(Clone, Debug)]
pub struct BackendClient {
    http: Client,
    base_url: String,
}

impl BackendClient {
    /// Create a client for `base_url` (a trailing `/` is ignored).
    pub fn new(http: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { http, base_url }
    }

    /// The backend base URL, also used as the service-identity audience.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Full URL of a backend endpoint.
    pub fn endpoint_url(&self, endpoint: &str) -> String {
        if endpoint.starts_with('/') {
            format!("{}{endpoint}", self.base_url)
        } else {
            format!("{}/{endpoint}", self.base_url)
        }
    }

    /// Execute one call and normalize its outcome.
    ///
    /// - transport failure → `NormalizedError` without status
    /// - timeout → `NormalizedError` with status 504
    /// - status ≥ 400 → `NormalizedError` with the backend status and JSON body
    /// - otherwise → `BackendResponse` (placeholder payload for non-JSON bodies)
    #[instrument(skip_all, fields(method = %call.method, endpoint = call.endpoint))]
    pub async fn call(
        &self,
        call: &OutboundCall<'_>,
        proof: Option<&IdentityProof>,
        timeout: Duration,
    ) -> Result<BackendResponse, NormalizedError> {
        let started = Instant::now();
        let response = self
            .request(call, proof)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| self.transport_failure(call, &e))?;

        let status = response.status();
        let payload = match response.bytes().await {
            Ok(bytes) => parse_payload(&bytes),
            Err(e) if e.is_timeout() => return Err(self.transport_failure(call, &e)),
            Err(e) => {
                warn!(error = %e, "Failed to read backend body, using placeholder");
                None
            }
        };

        debug!(
            status = status.as_u16(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Backend call completed"
        );

        if status.as_u16() >= 400 {
            let error = NormalizedError::from_status(status, payload);
            metrics::record_backend_failure(error.kind());
            return Err(error);
        }

        Ok(BackendResponse::new(status, payload))
    }

    /// Execute one call and hand back the backend's literal status and body.
    ///
    /// Used for the end-user token path: no timeout is applied and error
    /// statuses are not converted. Only transport failures are errors.
    #[instrument(skip_all, fields(method = %call.method, endpoint = call.endpoint))]
    pub async fn relay(
        &self,
        call: &OutboundCall<'_>,
        proof: &IdentityProof,
    ) -> Result<BackendResponse, NormalizedError> {
        let response = self
            .request(call, Some(proof))
            .send()
            .await
            .map_err(|e| self.transport_failure(call, &e))?;

        let status = response.status();
        let payload = match response.bytes().await {
            Ok(bytes) => parse_payload(&bytes),
            Err(e) => {
                warn!(error = %e, "Failed to read backend body, using placeholder");
                None
            }
        };

        debug!(status = status.as_u16(), "Backend relay completed");
        Ok(BackendResponse::new(status, payload))
    }

    /// Probe an endpoint and report whether it answered 2xx within `timeout`.
    pub async fn probe(&self, endpoint: &str, timeout: Duration) -> bool {
        match self
            .http
            .get(self.endpoint_url(endpoint))
            .timeout(timeout)
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!(error = %e, endpoint, "Backend probe failed");
                false
            }
        }
    }

    /// Build the outbound request: headers, proof, query and body.
    fn request(&self, call: &OutboundCall<'_>, proof: Option<&IdentityProof>) -> RequestBuilder {
        let mut builder = self
            .http
            .request(call.method.as_http(), self.endpoint_url(call.endpoint))
            .header(CONTENT_TYPE, "application/json");

        match proof {
            Some(IdentityProof::User { credential }) => {
                builder = builder.header(AUTHORIZATION, credential.clone());
            }
            Some(IdentityProof::Service { token, .. }) => builder = builder.bearer_auth(token),
            None => {}
        }
        if let Some(request_id) = call.request_id {
            builder = builder.header(REQUEST_ID_HEADER, request_id);
        }
        if let Some(query) = call.effective_query() {
            builder = builder.query(query);
        }
        if let Some(body) = call.effective_body() {
            builder = builder.json(body);
        }

        builder
    }

    fn transport_failure(&self, call: &OutboundCall<'_>, e: &reqwest::Error) -> NormalizedError {
        let error = NormalizedError::from_reqwest(e);
        warn!(
            method = %call.method,
            endpoint = call.endpoint,
            status = ?error.status_code,
            error = %e,
            "Backend call failed"
        );
        metrics::record_backend_failure(error.kind());
        error
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::backend::ForwardMethod;
    use axum::http::{HeaderValue, StatusCode};
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const TIMEOUT: Duration = Duration::from_secs(5);

    fn client_for(server: &MockServer) -> BackendClient {
        BackendClient::new(Client::new(), server.uri())
    }

    fn user_proof() -> IdentityProof {
        IdentityProof::user(&HeaderValue::from_static("Bearer abc"))
    }

    fn service_proof() -> IdentityProof {
        IdentityProof::service("svc-token", "http://backend")
    }

    #[test]
    fn test_endpoint_url_joins_slashes() {
        let client = BackendClient::new(Client::new(), "http://backend:8000/");
        assert_eq!(client.base_url(), "http://backend:8000");
        assert_eq!(client.endpoint_url("/services"), "http://backend:8000/services");
        assert_eq!(client.endpoint_url("services"), "http://backend:8000/services");
    }

    #[tokio::test]
    async fn test_call_sends_bearer_content_type_and_query() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/availability"))
            .and(query_param("date", "2024-06-01"))
            .and(header("authorization", "Bearer svc-token"))
            .and(header("content-type", "application/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"slot": "09:00"}])))
            .expect(1)
            .mount(&server)
            .await;

        let query = BTreeMap::from([("date".to_string(), "2024-06-01".to_string())]);
        let call = OutboundCall::new(ForwardMethod::Get, "/availability").with_query(&query);
        let response = client_for(&server)
            .call(&call, Some(&service_proof()), TIMEOUT)
            .await
            .unwrap();

        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.payload, json!([{"slot": "09:00"}]));
    }

    #[tokio::test]
    async fn test_call_serializes_post_body() {
        let server = MockServer::start().await;
        let body = json!({"service_id": "oil-change", "slot": "09:00"});
        Mock::given(method("POST"))
            .and(path("/bookings"))
            .and(body_json(body.clone()))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "b-1"})))
            .expect(1)
            .mount(&server)
            .await;

        let call = OutboundCall::new(ForwardMethod::Post, "/bookings").with_body(Some(&body));
        let response = client_for(&server)
            .call(&call, Some(&service_proof()), TIMEOUT)
            .await
            .unwrap();

        assert_eq!(response.status, StatusCode::CREATED);
        assert_eq!(response.payload, json!({"id": "b-1"}));
    }

    #[tokio::test]
    async fn test_call_without_proof_omits_authorization() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/services"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let call = OutboundCall::new(ForwardMethod::Get, "/services");
        client_for(&server).call(&call, None, TIMEOUT).await.unwrap();

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
        let request = requests.first().unwrap();
        assert!(request.headers.get("authorization").is_none());
    }

    #[tokio::test]
    async fn test_call_propagates_request_id() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/services"))
            .and(header("x-request-id", "req-42"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(1)
            .mount(&server)
            .await;

        let call = OutboundCall::new(ForwardMethod::Get, "/services").with_request_id(Some("req-42"));
        client_for(&server).call(&call, None, TIMEOUT).await.unwrap();
    }

    #[tokio::test]
    async fn test_call_error_status_is_normalized() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/users/me"))
            .respond_with(ResponseTemplate::new(403).set_body_json(json!({"detail": "forbidden"})))
            .mount(&server)
            .await;

        let body = json!({"name": "x"});
        let call = OutboundCall::new(ForwardMethod::Put, "/users/me").with_body(Some(&body));
        let err = client_for(&server)
            .call(&call, Some(&service_proof()), TIMEOUT)
            .await
            .unwrap_err();

        assert_eq!(err.status_code, Some(403));
        assert_eq!(err.payload, Some(json!({"detail": "forbidden"})));
    }

    #[tokio::test]
    async fn test_call_error_status_with_text_body_has_no_payload() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(502).set_body_string("Bad Gateway"))
            .mount(&server)
            .await;

        let call = OutboundCall::new(ForwardMethod::Get, "/services");
        let err = client_for(&server).call(&call, None, TIMEOUT).await.unwrap_err();

        assert_eq!(err.status_code, Some(502));
        assert!(err.payload.is_none());
    }

    #[tokio::test]
    async fn test_call_invalid_json_degrades_to_placeholder() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/vehicles/users/me/vehicles/v1"))
            .respond_with(ResponseTemplate::new(200).set_body_string("deleted"))
            .mount(&server)
            .await;

        let call = OutboundCall::new(ForwardMethod::Delete, "/vehicles/users/me/vehicles/v1");
        let response = client_for(&server).call(&call, None, TIMEOUT).await.unwrap();

        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(
            response.payload,
            json!({"detail": "No response data or invalid JSON"})
        );
    }

    #[tokio::test]
    async fn test_call_empty_body_degrades_to_placeholder() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let call = OutboundCall::new(ForwardMethod::Delete, "/customers/c1");
        let response = client_for(&server).call(&call, None, TIMEOUT).await.unwrap();

        assert_eq!(response.status, StatusCode::NO_CONTENT);
        assert_eq!(response.payload["detail"], "No response data or invalid JSON");
    }

    #[tokio::test]
    async fn test_call_timeout_is_504() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!([]))
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let call = OutboundCall::new(ForwardMethod::Get, "/services");
        let err = client_for(&server)
            .call(&call, None, Duration::from_millis(50))
            .await
            .unwrap_err();

        assert_eq!(err.status_code, Some(504));
        assert_eq!(err.message, "timeout");
    }

    #[tokio::test]
    async fn test_call_connection_refused_has_no_status() {
        // Port 1 is never listening in the test environment
        let client = BackendClient::new(Client::new(), "http://127.0.0.1:1");
        let call = OutboundCall::new(ForwardMethod::Get, "/services");
        let err = client.call(&call, None, TIMEOUT).await.unwrap_err();

        assert_eq!(err.status_code, None);
        assert_eq!(err.message, "Backend unreachable");
        assert!(!err.to_string().contains("127.0.0.1"));
    }

    #[tokio::test]
    async fn test_relay_returns_literal_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(header("authorization", "Bearer abc"))
            .respond_with(ResponseTemplate::new(403).set_body_json(json!({"detail": "forbidden"})))
            .mount(&server)
            .await;

        let body = json!({"make": "Honda"});
        let call = OutboundCall::new(ForwardMethod::Put, "/vehicles/users/me/vehicles/v1")
            .with_body(Some(&body));
        let response = client_for(&server)
            .relay(&call, &user_proof())
            .await
            .unwrap();

        assert_eq!(response.status, StatusCode::FORBIDDEN);
        assert_eq!(response.payload, json!({"detail": "forbidden"}));
    }

    #[tokio::test]
    async fn test_relay_non_json_body_keeps_status_with_placeholder() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bookings"))
            .respond_with(ResponseTemplate::new(202).set_body_string("accepted"))
            .mount(&server)
            .await;

        let call = OutboundCall::new(ForwardMethod::Post, "/bookings");
        let response = client_for(&server).relay(&call, &user_proof()).await.unwrap();

        assert_eq!(response.status, StatusCode::ACCEPTED);
        assert_eq!(
            response.payload,
            json!({"detail": "No response data or invalid JSON"})
        );
    }

    #[tokio::test]
    async fn test_relay_empty_body_keeps_status_with_placeholder() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let call = OutboundCall::new(ForwardMethod::Delete, "/vehicles/users/me/vehicles/v1");
        let response = client_for(&server).relay(&call, &user_proof()).await.unwrap();

        assert_eq!(response.status, StatusCode::NO_CONTENT);
        assert_eq!(response.payload["detail"], "No response data or invalid JSON");
    }

    #[tokio::test]
    async fn test_relay_sends_opaque_user_header_verbatim() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;

        let raw = HeaderValue::from_bytes(b"Bearer t\xe9st").unwrap();
        let call = OutboundCall::new(ForwardMethod::Get, "/users/me");
        client_for(&server)
            .relay(&call, &IdentityProof::user(&raw))
            .await
            .unwrap();

        let requests = server.received_requests().await.unwrap();
        let sent = requests.first().unwrap().headers.get("authorization").unwrap();
        assert_eq!(sent.as_bytes(), b"Bearer t\xe9st");
    }

    #[tokio::test]
    async fn test_probe_reports_health() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/healthz"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "ok"})))
            .mount(&server)
            .await;

        let client = client_for(&server);
        assert!(client.probe("/healthz", TIMEOUT).await);
        assert!(!client.probe("/missing", TIMEOUT).await);
    }
}
