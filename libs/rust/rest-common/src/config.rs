//! Outbound client configuration and named timeout profiles.
//!
//! All profiles share one connect timeout and one pool configuration; a
//! profile only chooses the read timeout.

use crate::error::ConfigError;
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Connect timeout shared by every profile.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Maximum connections leased at once across all routes.
pub const DEFAULT_POOL_MAX_TOTAL: usize = 50;

/// Maximum connections leased at once for a single route.
pub const DEFAULT_POOL_MAX_PER_ROUTE: usize = 50;

/// How long a caller waits for a connection lease before the call fails.
pub const DEFAULT_POOL_LEASE_TIMEOUT: Duration = Duration::from_secs(180);

/// Named read-timeout profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientProfile {
    /// Primary profile, 30 second read timeout.
    Short,
    /// Long running calls, 120 second read timeout.
    Long,
}

impl ClientProfile {
    /// Read timeout of this profile.
    #[must_use]
    pub const fn read_timeout(self) -> Duration {
        match self {
            Self::Short => Duration::from_secs(30),
            Self::Long => Duration::from_secs(120),
        }
    }

    /// Profile name used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Short => "short",
            Self::Long => "long",
        }
    }
}

/// Outbound HTTP client configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestClientConfig {
    /// Connect timeout (default: 10s)
    pub connect_timeout: Duration,
    /// Read timeout (default: 30s, the short profile)
    pub read_timeout: Duration,
    /// Pool capacity across all routes (default: 50)
    pub pool_max_total: usize,
    /// Pool capacity per route (default: 50)
    pub pool_max_per_route: usize,
    /// Wait bound for a pool lease (default: 180s)
    pub pool_lease_timeout: Duration,
    /// Accept any server certificate and hostname (default: true)
    pub insecure_skip_verify: bool,
    /// User agent string
    pub user_agent: String,
}

impl Default for RestClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            read_timeout: ClientProfile::Short.read_timeout(),
            pool_max_total: DEFAULT_POOL_MAX_TOTAL,
            pool_max_per_route: DEFAULT_POOL_MAX_PER_ROUTE,
            pool_lease_timeout: DEFAULT_POOL_LEASE_TIMEOUT,
            insecure_skip_verify: true,
            user_agent: concat!("rest-common/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl RestClientConfig {
    /// Loads configuration from environment variables, falling back to defaults.
    ///
    /// Reads `REST_CONNECT_TIMEOUT_SECS`, `REST_POOL_MAX_TOTAL`,
    /// `REST_POOL_MAX_PER_ROUTE`, `REST_POOL_LEASE_TIMEOUT_SECS`,
    /// `REST_INSECURE_SKIP_VERIFY` and `REST_USER_AGENT`.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is present but unparsable, or if the
    /// resulting configuration fails [`RestClientConfig::validate`].
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Same as [`RestClientConfig::from_env`], reading variables through `lookup`.
    ///
    /// # Errors
    ///
    /// See [`RestClientConfig::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let config = Self {
            connect_timeout: Duration::from_secs(parse_var(
                &lookup,
                "REST_CONNECT_TIMEOUT_SECS",
                defaults.connect_timeout.as_secs(),
            )?),
            read_timeout: defaults.read_timeout,
            pool_max_total: parse_var(&lookup, "REST_POOL_MAX_TOTAL", defaults.pool_max_total)?,
            pool_max_per_route: parse_var(
                &lookup,
                "REST_POOL_MAX_PER_ROUTE",
                defaults.pool_max_per_route,
            )?,
            pool_lease_timeout: Duration::from_secs(parse_var(
                &lookup,
                "REST_POOL_LEASE_TIMEOUT_SECS",
                defaults.pool_lease_timeout.as_secs(),
            )?),
            insecure_skip_verify: parse_var(
                &lookup,
                "REST_INSECURE_SKIP_VERIFY",
                defaults.insecure_skip_verify,
            )?,
            user_agent: lookup("REST_USER_AGENT").unwrap_or(defaults.user_agent),
        };

        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns the first invalid setting found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.connect_timeout.is_zero() {
            return Err(ConfigError::InvalidTimeout("connect_timeout"));
        }
        if self.read_timeout.is_zero() {
            return Err(ConfigError::InvalidTimeout("read_timeout"));
        }
        if self.pool_lease_timeout.is_zero() {
            return Err(ConfigError::InvalidTimeout("pool_lease_timeout"));
        }
        if self.pool_max_total == 0 {
            return Err(ConfigError::InvalidPoolSize("pool_max_total"));
        }
        if self.pool_max_per_route == 0 {
            return Err(ConfigError::InvalidPoolSize("pool_max_per_route"));
        }
        if self.pool_max_per_route > self.pool_max_total {
            return Err(ConfigError::PerRouteExceedsTotal {
                per_route: self.pool_max_per_route,
                total: self.pool_max_total,
            });
        }
        Ok(())
    }

    /// Same configuration with the read timeout of `profile`.
    #[must_use]
    pub fn for_profile(self, profile: ClientProfile) -> Self {
        self.with_read_timeout(profile.read_timeout())
    }

    /// Set read timeout.
    #[must_use]
    pub const fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Set connect timeout.
    #[must_use]
    pub const fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set pool capacities.
    #[must_use]
    pub const fn with_pool_limits(mut self, max_total: usize, max_per_route: usize) -> Self {
        self.pool_max_total = max_total;
        self.pool_max_per_route = max_per_route;
        self
    }

    /// Set the lease wait bound.
    #[must_use]
    pub const fn with_pool_lease_timeout(mut self, timeout: Duration) -> Self {
        self.pool_lease_timeout = timeout;
        self
    }

    /// Enable or disable certificate and hostname verification bypass.
    #[must_use]
    pub const fn with_insecure_skip_verify(mut self, skip: bool) -> Self {
        self.insecure_skip_verify = skip;
        self
    }

    /// Set user agent.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

fn parse_var<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: T,
) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        Some(value) => value.trim().parse().map_err(|e: T::Err| ConfigError::ParseError {
            name: name.to_string(),
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}
