//! Request forwarding: one inbound request in, one backend call out.
//!
//! # Lifecycle
//!
//! ```text
//! Received → MethodChecked → PathValidated → BodyParsed
//!          → AuthPathSelected{User | Service | Rejected}
//!          → Dispatched → ResponseNormalized → Written
//! ```
//!
//! Each step either advances or ends the request with an [`AppError`];
//! there are no retries. A rejected request never reaches the backend.
//!
//! # Status Normalization
//!
//! | Path    | Backend outcome | Reported status          |
//! |---------|-----------------|--------------------------|
//! | User    | any status      | backend status, verbatim |
//! | Service | success, POST   | 201                      |
//! | Service | success, other  | 200                      |
//! | Service | ≥ 400 / failure | backend status or 500    |

mod policy;
mod request;

use std::time::{Duration, Instant};

use axum::Json;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, info, instrument};

use crate::backend::{BackendClient, ForwardMethod, OutboundCall};
use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::identity::CredentialProvider;
use crate::metrics;
use crate::validation::{validate_forward_path, validate_query_len};

pub use policy::{AuthPath, DEFAULT_TIMEOUT, ForwardOptions, select_auth_path};
pub use request::InboundRequest;

/// Connect timeout of the shared outbound HTTP client.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

/// Metric label for a method outside the forwarded set.
const UNSUPPORTED_METHOD_LABEL: &str = "other";

/// Metric label for a request rejected before an auth path was chosen.
const NO_AUTH_PATH_LABEL: &str = "none";

/// Normalized response of a successful forward.
#[derive(Debug, Clone, PartialEq)]
pub struct ForwardResponse {
    pub status: StatusCode,
    pub body: Value,
    pub auth_path: AuthPath,
}

impl IntoResponse for ForwardResponse {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

/// Status reported for a successful service-path call.
pub fn service_success_status(method: ForwardMethod) -> StatusCode {
    match method {
        ForwardMethod::Post => StatusCode::CREATED,
        _ => StatusCode::OK,
    }
}

/// Forwards inbound requests to the backend with the right credential.
///
/// Holds no per-request state; clones share the outbound connection pool.
#[derive(Clone, Debug)]
pub struct RequestForwarder {
    backend: BackendClient,
    credentials: CredentialProvider,
}

impl RequestForwarder {
    pub fn new(backend: BackendClient, credentials: CredentialProvider) -> Self {
        Self {
            backend,
            credentials,
        }
    }

    /// Build the forwarder and its shared HTTP client from configuration.
    pub fn from_config(config: &Config) -> AppResult<Self> {
        let http = Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {e}")))?;

        let backend = BackendClient::new(http.clone(), config.backend_base_url.clone());
        let credentials = CredentialProvider::from_config(http, config);

        info!(
            backend = backend.base_url(),
            service_identity = credentials.is_enabled(),
            on_failure = %credentials.failure_policy(),
            "Request forwarder configured"
        );

        Ok(Self::new(backend, credentials))
    }

    pub fn backend(&self) -> &BackendClient {
        &self.backend
    }

    pub fn credentials(&self) -> &CredentialProvider {
        &self.credentials
    }

    /// Forward one inbound request and normalize the outcome.
    ///
    /// # Errors
    ///
    /// - `MethodNotAllowed` for anything but GET/POST/PUT/DELETE
    /// - `BadRequest` / `InvalidBody` for an unsafe path or malformed JSON body
    /// - `AuthenticationRequired` when auth is required and no token was sent
    /// - `ServiceIdentity` when minting fails under the `fail` policy
    /// - `Backend` for backend error statuses and transport failures
    #[instrument(
        skip_all,
        fields(
            method = %req.method,
            path = %req.path,
            route = req.route,
            auth_path = tracing::field::Empty,
        )
    )]
    pub async fn forward(
        &self,
        req: &InboundRequest,
        opts: &ForwardOptions,
    ) -> AppResult<ForwardResponse> {
        let started = Instant::now();
        let mut auth_path = None;
        let result = self.run(req, opts, &mut auth_path).await;

        let status = match &result {
            Ok(response) => response.status,
            Err(e) => e.status_code(),
        };
        let method = ForwardMethod::try_from(&req.method)
            .map_or(UNSUPPORTED_METHOD_LABEL, ForwardMethod::as_str);
        let auth_path = auth_path.map_or(NO_AUTH_PATH_LABEL, AuthPath::as_str);
        metrics::record_forward(req.route, method, auth_path, status.as_u16());
        metrics::record_forward_duration(
            req.route,
            method,
            auth_path,
            started.elapsed().as_secs_f64(),
        );
        debug!(
            status = status.as_u16(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Forward completed"
        );

        result
    }

    /// The forwarding steps proper. `auth_path` is set once a path is chosen.
    async fn run(
        &self,
        req: &InboundRequest,
        opts: &ForwardOptions,
        auth_path: &mut Option<AuthPath>,
    ) -> AppResult<ForwardResponse> {
        let method = ForwardMethod::try_from(&req.method)?;

        let endpoint = req.path.strip_prefix('/').ok_or_else(|| {
            AppError::BadRequest("Path must start with '/'".to_string())
        })?;
        validate_forward_path(endpoint)?;
        if method.carries_query() {
            validate_query_len(req.query.len())?;
        }

        let body = req.json_body(method)?;

        let user_credential = req.user_credential();
        let selected = select_auth_path(user_credential.is_some(), opts);
        *auth_path = Some(selected);
        tracing::Span::current().record("auth_path", selected.as_str());

        let call = OutboundCall::new(method, &req.path)
            .with_query(&req.query)
            .with_body(body.as_ref())
            .with_request_id(req.request_id());

        match selected {
            AuthPath::User => self.forward_as_user(&call, user_credential).await,
            AuthPath::Rejected => Err(AppError::AuthenticationRequired),
            AuthPath::Service => self.forward_as_service(&call, opts).await,
        }
    }

    async fn forward_as_user(
        &self,
        call: &OutboundCall<'_>,
        user_credential: Option<&HeaderValue>,
    ) -> AppResult<ForwardResponse> {
        let credential = user_credential.ok_or(AppError::AuthenticationRequired)?;
        let proof = CredentialProvider::use_user_token(credential);
        let response = self.backend.relay(call, &proof).await?;

        Ok(ForwardResponse {
            status: response.status,
            body: response.payload,
            auth_path: AuthPath::User,
        })
    }

    async fn forward_as_service(
        &self,
        call: &OutboundCall<'_>,
        opts: &ForwardOptions,
    ) -> AppResult<ForwardResponse> {
        let proof = self
            .credentials
            .service_proof(self.backend.base_url())
            .await?;
        let response = self.backend.call(call, proof.as_ref(), opts.timeout).await?;

        Ok(ForwardResponse {
            status: service_success_status(call.method),
            body: response.payload,
            auth_path: AuthPath::Service,
        })
    }
}
