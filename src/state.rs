//! Shared application state.

use std::sync::Arc;
use std::time::Instant;

use crate::config::Config;
use crate::error::AppResult;
use crate::forwarder::RequestForwarder;

/// State shared by all handlers.
///
/// Read-only after start-up; cloning is cheap (`Arc` config, pooled HTTP
/// client inside the forwarder). No per-request state lives here.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub forwarder: RequestForwarder,
    started_at: Instant,
}

impl AppState {
    /// Build state from configuration.
    ///
    /// # Errors
    ///
    /// Fails if the outbound HTTP client cannot be built.
    pub fn new(config: Config) -> AppResult<Self> {
        let forwarder = RequestForwarder::from_config(&config)?;
        Ok(Self::with_forwarder(config, forwarder))
    }

    /// Build state around an existing forwarder.
    pub fn with_forwarder(config: Config, forwarder: RequestForwarder) -> Self {
        Self {
            config: Arc::new(config),
            forwarder,
            started_at: Instant::now(),
        }
    }

    /// Seconds since the state was created.
    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
