//! Identity tokens from the platform metadata server.
//!
//! On Cloud Run and GCE every workload can ask the metadata server for an
//! OIDC identity token whose `aud` claim is a URL of its choosing:
//!
//! ```text
//! GET http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/identity?audience=<aud>
//! Metadata-Flavor: Google
//!
//! 200 OK
//! eyJhbGciOiJSUzI1NiIs...
//! ```
//!
//! The response body is the raw token as plain text.

use std::time::Duration;

use reqwest::Client;
use tracing::debug;

use super::AuthError;

/// Default identity endpoint of the GCP metadata server.
pub const DEFAULT_IDENTITY_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/identity";

/// Header the metadata server requires on every request.
pub const METADATA_FLAVOR_HEADER: &str = "Metadata-Flavor";

/// Value of [`METADATA_FLAVOR_HEADER`].
pub const METADATA_FLAVOR_VALUE: &str = "Google";

/// Fetch an identity token for `audience` from `identity_url`.
pub async fn fetch_identity_token(
    http: &Client,
    identity_url: &str,
    audience: &str,
    timeout: Duration,
) -> Result<String, AuthError> {
    let response = http
        .get(identity_url)
        .query(&[("audience", audience)])
        .header(METADATA_FLAVOR_HEADER, METADATA_FLAVOR_VALUE)
        .timeout(timeout)
        .send()
        .await
        .map_err(|e| AuthError::Unavailable(format!("Failed to call identity endpoint: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        return Err(AuthError::Rejected(status.as_u16()));
    }

    let body = response
        .text()
        .await
        .map_err(|e| AuthError::Unavailable(format!("Failed to read identity token: {e}")))?;

    let token = body.trim();
    if token.is_empty() {
        return Err(AuthError::EmptyToken);
    }

    debug!(audience, token_len = token.len(), "Identity token issued");
    Ok(token.to_string())
}
