//! Credentials attached to outbound backend calls.
//!
//! Two kinds of proof exist:
//!
//! - **User token**: the end user's bearer token, taken verbatim from the
//!   inbound `Authorization` header. It is never verified here; the backend
//!   owns that.
//! - **Service token**: an identity token minted by the hosting platform for
//!   this gateway, with the backend base URL as audience.
//!
//! Both are sent as `Authorization: Bearer <token>`, except that a user
//! header which is not visible ASCII is forwarded byte for byte. Proofs live
//! for one outbound call and are never cached.
//!
//! # Failure Policy
//!
//! When the ambient identity mechanism is disabled the provider returns no
//! proof and the call goes out unauthenticated. When it is enabled but
//! minting fails, [`IdentityFailurePolicy`] decides between failing the
//! request and proceeding without a token.

mod metadata;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::HeaderValue;
use reqwest::Client;
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::config::Config;
use crate::metrics;

pub use metadata::{
    DEFAULT_IDENTITY_TOKEN_URL, METADATA_FLAVOR_HEADER, METADATA_FLAVOR_VALUE,
    fetch_identity_token,
};

/// Errors from obtaining a service identity token.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("service identity is disabled")]
    Disabled,

    #[error("identity endpoint unavailable: {0}")]
    Unavailable(String),

    #[error("identity endpoint responded with status {0}")]
    Rejected(u16),

    #[error("identity endpoint returned an empty token")]
    EmptyToken,
}

impl AuthError {
    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            AuthError::Disabled => "disabled",
            AuthError::Unavailable(_) => "unavailable",
            AuthError::Rejected(_) => "rejected",
            AuthError::EmptyToken => "empty",
        }
    }
}

/// Identity proof for one outbound call.
#[derive(Clone, PartialEq, Eq)]
pub enum IdentityProof {
    /// End-user credential, passed through unverified as the outbound
    /// `Authorization` header value.
    User { credential: HeaderValue },
    /// Platform-issued service identity token.
    Service { token: String, audience: String },
}

impl IdentityProof {
    /// Wrap an inbound `Authorization` header value.
    ///
    /// A visible-ASCII value has a leading `Bearer ` scheme (any case)
    /// normalized so the header goes out as `Bearer <token>`. Any other value
    /// is forwarded byte for byte.
    pub fn user(raw: &HeaderValue) -> Self {
        let mut credential = raw
            .to_str()
            .ok()
            .and_then(|text| HeaderValue::from_str(&normalize_bearer(text)).ok())
            .unwrap_or_else(|| raw.clone());
        credential.set_sensitive(true);
        IdentityProof::User { credential }
    }

    pub fn service(token: impl Into<String>, audience: impl Into<String>) -> Self {
        IdentityProof::Service {
            token: token.into(),
            audience: audience.into(),
        }
    }

    /// `"user"` or `"service"`.
    pub fn kind(&self) -> &'static str {
        match self {
            IdentityProof::User { .. } => "user",
            IdentityProof::Service { .. } => "service",
        }
    }
}

fn normalize_bearer(raw: &str) -> String {
    let raw = raw.trim();
    let token = match raw.split_once(' ') {
        Some((scheme, rest)) if scheme.eq_ignore_ascii_case("bearer") => rest.trim_start(),
        _ => raw,
    };
    format!("Bearer {token}")
}

// Tokens must never reach the logs
impl fmt::Debug for IdentityProof {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentityProof::User { .. } => f
                .debug_struct("User")
                .field("token", &"<redacted>")
                .finish(),
            IdentityProof::Service { audience, .. } => f
                .debug_struct("Service")
                .field("token", &"<redacted>")
                .field("audience", audience)
                .finish(),
        }
    }
}

/// What to do when minting a service token fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IdentityFailurePolicy {
    /// Fail the forwarding operation.
    #[default]
    Fail,
    /// Forward without an `Authorization` header.
    Anonymous,
}

impl FromStr for IdentityFailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fail" => Ok(IdentityFailurePolicy::Fail),
            "anonymous" => Ok(IdentityFailurePolicy::Anonymous),
            other => Err(format!("expected 'fail' or 'anonymous', got '{other}'")),
        }
    }
}

impl fmt::Display for IdentityFailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentityFailurePolicy::Fail => write!(f, "fail"),
            IdentityFailurePolicy::Anonymous => write!(f, "anonymous"),
        }
    }
}

/// Produces identity proofs for outbound calls.
#[derive(Clone, Debug)]
pub struct CredentialProvider {
    http: Client,
    /// Identity endpoint; `None` when the ambient mechanism is disabled
    identity_url: Option<Arc<str>>,
    timeout: Duration,
    on_failure: IdentityFailurePolicy,
}

impl CredentialProvider {
    pub fn new(
        http: Client,
        identity_url: Option<String>,
        timeout: Duration,
        on_failure: IdentityFailurePolicy,
    ) -> Self {
        Self {
            http,
            identity_url: identity_url.map(Arc::from),
            timeout,
            on_failure,
        }
    }

    /// Build from configuration.
    pub fn from_config(http: Client, config: &Config) -> Self {
        let identity_url = config
            .service_identity_enabled
            .then(|| config.identity_token_url.clone());
        Self::new(
            http,
            identity_url,
            config.identity_timeout,
            config.identity_failure_policy,
        )
    }

    /// Whether service tokens can be minted at all.
    pub fn is_enabled(&self) -> bool {
        self.identity_url.is_some()
    }

    pub fn failure_policy(&self) -> IdentityFailurePolicy {
        self.on_failure
    }

    /// Wrap the end user's `Authorization` header.
    pub fn use_user_token(raw: &HeaderValue) -> IdentityProof {
        IdentityProof::user(raw)
    }

    /// Mint a fresh service identity token scoped to `audience`.
    pub async fn mint_service_token(&self, audience: &str) -> Result<IdentityProof, AuthError> {
        let identity_url = self.identity_url.as_deref().ok_or(AuthError::Disabled)?;
        let token = fetch_identity_token(&self.http, identity_url, audience, self.timeout).await?;
        Ok(IdentityProof::service(token, audience))
    }

    /// Proof for the service path, with the failure policy applied.
    ///
    /// `Ok(None)` means the call proceeds without credentials.
    #[instrument(skip(self))]
    pub async fn service_proof(&self, audience: &str) -> Result<Option<IdentityProof>, AuthError> {
        if !self.is_enabled() {
            debug!("Service identity disabled, forwarding without a token");
            metrics::record_identity_mint("disabled");
            return Ok(None);
        }

        match self.mint_service_token(audience).await {
            Ok(proof) => {
                metrics::record_identity_mint("success");
                Ok(Some(proof))
            }
            Err(e) => {
                metrics::record_identity_mint(e.kind());
                match self.on_failure {
                    IdentityFailurePolicy::Fail => {
                        warn!(error = %e, "Service identity token could not be minted");
                        Err(e)
                    }
                    IdentityFailurePolicy::Anonymous => {
                        warn!(error = %e, "Service identity token could not be minted, forwarding without a token");
                        Ok(None)
                    }
                }
            }
        }
    }
}
