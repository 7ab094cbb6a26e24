//! Client construction with consistent pool, TLS and timeout configuration.
//!
//! Every client built here gets its own connection pool, the
//! [`TracingInterceptor`] followed by any extra interceptors, and the
//! [`StatusOkOnly`] classifier.

use crate::client::RestClient;
use crate::config::{ClientProfile, RestClientConfig};
use crate::error::{BuildError, ConfigError};
use crate::interceptor::{Interceptor, ReqwestTransport};
use crate::pool::{ConnectionPool, PoolLimits};
use crate::trace::TracingInterceptor;
use crate::translate::{ResponseErrorHandler, StatusOkOnly};
use reqwest::{Client, ClientBuilder};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Builds [`RestClient`]s from one shared configuration.
#[derive(Clone)]
pub struct ClientFactory {
    config: RestClientConfig,
    extra_interceptors: Vec<Arc<dyn Interceptor>>,
}

impl ClientFactory {
    /// Create a factory.
    #[must_use]
    pub fn new(config: RestClientConfig) -> Self {
        Self {
            config,
            extra_interceptors: Vec::new(),
        }
    }

    /// Create a factory configured from the environment.
    ///
    /// # Errors
    ///
    /// See [`RestClientConfig::from_env`].
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self::new(RestClientConfig::from_env()?))
    }

    /// Append an interceptor that runs after the tracing interceptor.
    #[must_use]
    pub fn with_interceptor(mut self, interceptor: Arc<dyn Interceptor>) -> Self {
        self.extra_interceptors.push(interceptor);
        self
    }

    /// Shared configuration.
    #[must_use]
    pub const fn config(&self) -> &RestClientConfig {
        &self.config
    }

    /// Build a client with the given read timeout.
    ///
    /// # Errors
    ///
    /// Fails when the configuration is invalid, or when the TLS backend or
    /// the I/O runtime cannot be initialized. This is a startup failure, not
    /// a per-call one.
    pub fn build_client(&self, read_timeout: Duration) -> Result<RestClient, BuildError> {
        let config = self.config.clone().with_read_timeout(read_timeout);
        config.validate()?;

        if config.insecure_skip_verify {
            warn!("TLS certificate and hostname verification disabled for outbound client");
        }

        let pool = ConnectionPool::new(PoolLimits {
            max_total: config.pool_max_total,
            max_per_route: config.pool_max_per_route,
            lease_timeout: config.pool_lease_timeout,
        });
        let transport = ReqwestTransport::new(build_http_client(&config)?, pool)?;

        let mut interceptors: Vec<Arc<dyn Interceptor>> = Vec::with_capacity(1 + self.extra_interceptors.len());
        interceptors.push(Arc::new(TracingInterceptor::new()));
        interceptors.extend(self.extra_interceptors.iter().cloned());

        let error_handler: Arc<dyn ResponseErrorHandler> = Arc::new(StatusOkOnly);

        info!(
            connect_timeout_secs = config.connect_timeout.as_secs(),
            read_timeout_secs = config.read_timeout.as_secs(),
            pool_max_total = config.pool_max_total,
            pool_max_per_route = config.pool_max_per_route,
            "outbound HTTP client built"
        );

        Ok(RestClient::from_parts(
            Arc::new(transport),
            interceptors,
            error_handler,
            config.read_timeout,
        ))
    }

    /// Build the client of a named profile.
    ///
    /// # Errors
    ///
    /// See [`ClientFactory::build_client`].
    pub fn build_profile(&self, profile: ClientProfile) -> Result<RestClient, BuildError> {
        debug!(profile = profile.as_str(), "building outbound client profile");
        self.build_client(profile.read_timeout())
    }

    /// Build both named profiles.
    ///
    /// # Errors
    ///
    /// See [`ClientFactory::build_client`].
    pub fn build_profiles(&self) -> Result<RestClients, BuildError> {
        Ok(RestClients {
            primary: self.build_profile(ClientProfile::Short)?,
            long: self.build_profile(ClientProfile::Long)?,
        })
    }
}

impl std::fmt::Debug for ClientFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientFactory")
            .field("config", &self.config)
            .field("extra_interceptors", &self.extra_interceptors.len())
            .finish()
    }
}

/// The two named clients an application wires at startup.
#[derive(Debug, Clone)]
pub struct RestClients {
    /// 30 second read timeout; the default choice
    pub primary: RestClient,
    /// 120 second read timeout
    pub long: RestClient,
}

/// Build the underlying reqwest client.
///
/// The read timeout bounds each socket read and resets after every
/// successful one; no limit is put on the exchange as a whole.
fn build_http_client(config: &RestClientConfig) -> Result<Client, reqwest::Error> {
    ClientBuilder::new()
        .connect_timeout(config.connect_timeout)
        .read_timeout(config.read_timeout)
        .pool_max_idle_per_host(config.pool_max_per_route)
        .user_agent(config.user_agent.clone())
        .use_rustls_tls()
        .danger_accept_invalid_certs(config.insecure_skip_verify)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_profiles() {
        let clients = ClientFactory::new(RestClientConfig::default())
            .build_profiles()
            .unwrap();

        assert_eq!(clients.primary.read_timeout(), Duration::from_secs(30));
        assert_eq!(clients.long.read_timeout(), Duration::from_secs(120));
        assert_eq!(clients.primary.interceptor_count(), 1);
        assert_eq!(clients.long.interceptor_count(), 1);
    }

    #[test]
    fn test_extra_interceptors_are_appended() {
        let client = ClientFactory::new(RestClientConfig::default())
            .with_interceptor(Arc::new(TracingInterceptor::new()))
            .build_profile(ClientProfile::Short)
            .unwrap();
        assert_eq!(client.interceptor_count(), 2);
    }

    #[test]
    fn test_invalid_config_fails_construction() {
        let factory = ClientFactory::new(RestClientConfig::default().with_pool_limits(0, 0));
        let err = factory.build_client(Duration::from_secs(30)).unwrap_err();
        assert!(matches!(
            err,
            BuildError::Config(ConfigError::InvalidPoolSize("pool_max_total"))
        ));
    }

    #[test]
    fn test_zero_read_timeout_rejected() {
        let factory = ClientFactory::new(RestClientConfig::default());
        assert!(factory.build_client(Duration::ZERO).is_err());
    }
}
