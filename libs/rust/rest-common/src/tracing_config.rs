//! Subscriber setup for services using this crate.
//!
//! The per-call JSON lines are written on [`crate::REST_LOG_TARGET`]; its
//! level can be tuned independently of the service level.

use crate::trace::REST_LOG_TARGET;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Tracing configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TracingConfig {
    /// Service name recorded at startup
    pub service_name: String,
    /// Log level filter
    pub log_level: String,
    /// Level of the per-call rest log lines
    pub rest_log_level: String,
    /// Whether to output JSON format
    pub json_output: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            service_name: "rust-service".to_string(),
            log_level: "info".to_string(),
            rest_log_level: "info".to_string(),
            json_output: false,
        }
    }
}

impl TracingConfig {
    /// Create config with custom service name.
    #[must_use]
    pub fn with_service_name(mut self, name: impl Into<String>) -> Self {
        self.service_name = name.into();
        self
    }

    /// Create config with custom log level.
    #[must_use]
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Create config with custom rest log level, e.g. `"off"` to silence it.
    #[must_use]
    pub fn with_rest_log_level(mut self, level: impl Into<String>) -> Self {
        self.rest_log_level = level.into();
        self
    }

    /// Enable JSON output.
    #[must_use]
    pub const fn with_json_output(mut self) -> Self {
        self.json_output = true;
        self
    }

    /// Filter directives built from this configuration.
    #[must_use]
    pub fn directives(&self) -> String {
        format!("{},{REST_LOG_TARGET}={}", self.log_level, self.rest_log_level)
    }
}

/// Install the global subscriber. `RUST_LOG` overrides the configured levels.
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed.
pub fn init_tracing(config: &TracingConfig) -> Result<(), TryInitError> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config.directives()));

    if config.json_output {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .try_init()?;
    }

    tracing::info!(service = %config.service_name, "tracing initialized");
    Ok(())
}
