//! Gateway configuration loaded from environment variables.
//!
//! # Configuration Hierarchy
//!
//! All configuration is loaded from environment variables with defaults for
//! development. `BACKEND_URL` is the only required variable. In production,
//! configure via environment variables or a `.env` file.
//!
//! # Backend
//!
//! - `BACKEND_URL`: Base URL of the booking backend (required)
//! - `API_PREFIX`: Path prefix of proxied routes (default: `/api`)
//! - `DEFAULT_TIMEOUT_MS`: Service-path timeout for reads (default: 5000)
//! - `WRITE_TIMEOUT_MS`: Service-path timeout for writes (default: 10000)
//!
//! # Service Identity
//!
//! - `SERVICE_IDENTITY_ENABLED`: Mint platform identity tokens (default: on when
//!   `K_SERVICE` is set, i.e. running on Cloud Run)
//! - `IDENTITY_TOKEN_URL`: Metadata server identity endpoint
//! - `IDENTITY_TIMEOUT_MS`: Bound on one mint round trip (default: 2000)
//! - `SERVICE_IDENTITY_ON_FAILURE`: `fail` (default) or `anonymous`

use std::env;
use std::time::Duration;

use axum::http::Method;

use crate::error::{AppError, AppResult};
use crate::identity::{DEFAULT_IDENTITY_TOKEN_URL, IdentityFailurePolicy};

/// Output format of the log subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("expected 'pretty' or 'json', got '{other}'")),
        }
    }
}

impl std::fmt::Display for LogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogFormat::Pretty => write!(f, "pretty"),
            LogFormat::Json => write!(f, "json"),
        }
    }
}

/// Gateway configuration.
///
/// Built once at start-up and shared read-only through `AppState`.
///
/// # Example
///
/// ```rust,ignore
/// let config = Config::from_env()?;
/// println!("Forwarding {} to {}", config.api_prefix, config.backend_base_url);
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    // =========================================================================
    // Server Configuration
    // =========================================================================
    /// Server host address (default: "0.0.0.0")
    pub host: String,

    /// Server port (default: 3000)
    pub port: u16,

    /// Path prefix under which backend resources are proxied (default: "/api")
    pub api_prefix: String,

    /// Maximum inbound request body size in bytes (default: 1MB)
    pub max_request_body_size: usize,

    /// Comma-separated list of allowed CORS origins
    /// Use "*" to allow all origins (not recommended for production)
    pub cors_allowed_origins: Vec<String>,

    // =========================================================================
    // Backend Configuration
    // =========================================================================
    /// Backend base URL without trailing slash. Also the identity token audience.
    pub backend_base_url: String,

    /// Service-path timeout for GET requests (default: 5s)
    pub default_timeout: Duration,

    /// Service-path timeout for POST/PUT/DELETE requests (default: 10s)
    pub write_timeout: Duration,

    // =========================================================================
    // Service Identity Configuration
    // =========================================================================
    /// Whether the platform identity mechanism is available
    pub service_identity_enabled: bool,

    /// Identity token endpoint of the metadata server
    pub identity_token_url: String,

    /// Timeout for one identity token request (default: 2s)
    pub identity_timeout: Duration,

    /// Behavior when minting fails
    pub identity_failure_policy: IdentityFailurePolicy,

    // =========================================================================
    // Observability Configuration
    // =========================================================================
    /// Log output format (default: pretty)
    pub log_format: LogFormat,

    /// Port for Prometheus metrics endpoint (default: 9090, 0 = disabled)
    pub metrics_port: u16,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ConfigError` if `BACKEND_URL` is missing or any
    /// value is invalid.
    pub fn from_env() -> AppResult<Self> {
        // Load an .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let backend_base_url = env::var("BACKEND_URL")
            .ok()
            .map(|url| url.trim().trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty())
            .ok_or_else(|| AppError::ConfigError("BACKEND_URL must be set".to_string()))?;

        let config = Self {
            // Server
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: Self::parse_env("PORT", 3000)?,
            api_prefix: env::var("API_PREFIX")
                .map(|p| p.trim_end_matches('/').to_string())
                .unwrap_or_else(|_| "/api".to_string()),
            max_request_body_size: Self::parse_env("MAX_REQUEST_BODY_SIZE", 1024 * 1024)?,
            cors_allowed_origins: Self::parse_cors_origins(),

            // Backend
            backend_base_url,
            default_timeout: Duration::from_millis(Self::parse_env("DEFAULT_TIMEOUT_MS", 5000)?),
            write_timeout: Duration::from_millis(Self::parse_env("WRITE_TIMEOUT_MS", 10_000)?),

            // Service identity
            service_identity_enabled: Self::parse_env(
                "SERVICE_IDENTITY_ENABLED",
                env::var("K_SERVICE").is_ok(),
            )?,
            identity_token_url: env::var("IDENTITY_TOKEN_URL")
                .unwrap_or_else(|_| DEFAULT_IDENTITY_TOKEN_URL.to_string()),
            identity_timeout: Duration::from_millis(Self::parse_env("IDENTITY_TIMEOUT_MS", 2000)?),
            identity_failure_policy: Self::parse_env(
                "SERVICE_IDENTITY_ON_FAILURE",
                IdentityFailurePolicy::Fail,
            )?,

            // Observability
            log_format: Self::parse_env("LOG_FORMAT", LogFormat::Pretty)?,
            metrics_port: Self::parse_env("METRICS_PORT", 9090)?,
        };

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values for consistency and correctness.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ConfigError` if validation fails.
    pub fn validate(&self) -> AppResult<()> {
        let url = reqwest::Url::parse(&self.backend_base_url)
            .map_err(|e| AppError::ConfigError(format!("Invalid BACKEND_URL: {e}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(AppError::ConfigError(format!(
                "BACKEND_URL must use http or https, got '{}'",
                url.scheme()
            )));
        }

        if !self.api_prefix.starts_with('/') || self.api_prefix.len() < 2 {
            return Err(AppError::ConfigError(format!(
                "API_PREFIX must start with '/' and not be the root, got '{}'",
                self.api_prefix
            )));
        }

        if self.default_timeout.is_zero() {
            return Err(AppError::ConfigError(
                "DEFAULT_TIMEOUT_MS must be greater than 0".to_string(),
            ));
        }

        if self.write_timeout.is_zero() {
            return Err(AppError::ConfigError(
                "WRITE_TIMEOUT_MS must be greater than 0".to_string(),
            ));
        }

        if self.identity_timeout.is_zero() {
            return Err(AppError::ConfigError(
                "IDENTITY_TIMEOUT_MS must be greater than 0".to_string(),
            ));
        }

        if self.service_identity_enabled {
            reqwest::Url::parse(&self.identity_token_url)
                .map_err(|e| AppError::ConfigError(format!("Invalid IDENTITY_TOKEN_URL: {e}")))?;
        }

        if self.max_request_body_size == 0 {
            return Err(AppError::ConfigError(
                "MAX_REQUEST_BODY_SIZE must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Get the full server address for binding.
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Service-path timeout for a request method.
    pub fn timeout_for(&self, method: &Method) -> Duration {
        if *method == Method::GET {
            self.default_timeout
        } else {
            self.write_timeout
        }
    }

    /// Check if Prometheus metrics export is enabled.
    pub fn metrics_enabled(&self) -> bool {
        self.metrics_port > 0
    }

    /// Get the metrics endpoint address.
    ///
    /// Returns `None` if metrics are disabled (port = 0).
    pub fn metrics_addr(&self) -> Option<std::net::SocketAddr> {
        self.metrics_enabled()
            .then(|| std::net::SocketAddr::from(([0, 0, 0, 0], self.metrics_port)))
    }

    /// Parse an environment variable into the specified type with a default value.
    fn parse_env<T>(name: &str, default: T) -> AppResult<T>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        match env::var(name) {
            Ok(val) => val
                .trim()
                .parse()
                .map_err(|e| AppError::ConfigError(format!("Invalid {name}: {e}"))),
            Err(_) => Ok(default),
        }
    }

    /// Parse CORS allowed origins from environment variable.
    fn parse_cors_origins() -> Vec<String> {
        env::var("CORS_ALLOWED_ORIGINS")
            .unwrap_or_else(|_| "*".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }
}

/// Default configuration for testing and development.
///
/// Production deployments should use `Config::from_env()` instead.
impl Default for Config {
    fn default() -> Self {
        Self {
            // Server
            host: "0.0.0.0".to_string(),
            port: 3000,
            api_prefix: "/api".to_string(),
            max_request_body_size: 1024 * 1024,
            cors_allowed_origins: vec!["*".to_string()],
            // Backend
            backend_base_url: "http://localhost:8000".to_string(),
            default_timeout: Duration::from_secs(5),
            write_timeout: Duration::from_secs(10),
            // Service identity
            service_identity_enabled: false,
            identity_token_url: DEFAULT_IDENTITY_TOKEN_URL.to_string(),
            identity_timeout: Duration::from_secs(2),
            identity_failure_policy: IdentityFailurePolicy::Fail,
            // Observability
            log_format: LogFormat::Pretty,
            metrics_port: 9090,
        }
    }
}
