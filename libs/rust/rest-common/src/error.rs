//! Centralized error types for outbound HTTP calls.
//!
//! Every failure a caller can observe is expressed as a [`DomainError`]
//! carrying an HTTP status, a stable code and a human readable message.
//! Stable codes come from a closed table ([`CommonExternalCode`]) and are
//! rendered as `E-COM-0003` style strings.

use reqwest::StatusCode;
use std::time::Duration;
use thiserror::Error;

/// Prefix shared by every stable code in [`CommonExternalCode`].
pub const CODE_PREFIX: &str = "E-COM";

/// Width of the zero-padded numeric suffix of a stable code.
const CODE_WIDTH: usize = 4;

/// Message returned to callers when an exchange with a remote API fails.
pub const EXCHANGE_ERROR_MESSAGE: &str =
    "An error occurred while communicating with the external API";

/// Boxed cause attached to a [`DomainError`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A table entry that maps to exactly one HTTP status and stable code.
pub trait ResponseCode {
    /// Unpadded numeric suffix, e.g. `"3"`.
    fn raw_code(&self) -> &'static str;

    /// HTTP status bound to this code.
    fn http_status(&self) -> StatusCode;

    /// Message used when the error is built from the code alone.
    fn default_message(&self) -> &'static str;

    /// Rendered stable code, e.g. `E-COM-0003`.
    fn code(&self) -> String {
        render_code(CODE_PREFIX, self.raw_code())
    }
}

/// Renders `prefix` and a left zero-padded suffix as `PREFIX-0000`.
#[must_use]
pub fn render_code(prefix: &str, raw: &str) -> String {
    format!("{prefix}-{raw:0>CODE_WIDTH$}")
}

/// Base error codes shared by every outbound integration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommonExternalCode {
    /// Failure that does not fit any other entry.
    UndefinedError,
    /// A response body was required but empty.
    BodyIsEmpty,
    /// Transport level failure while talking to a remote API.
    ApiExchangeError,
    /// Templated mail could not be rendered or delivered.
    FailedMailing,
}

impl ResponseCode for CommonExternalCode {
    fn raw_code(&self) -> &'static str {
        match self {
            Self::UndefinedError => "1",
            Self::BodyIsEmpty => "2",
            Self::ApiExchangeError => "3",
            Self::FailedMailing => "4",
        }
    }

    fn http_status(&self) -> StatusCode {
        match self {
            Self::UndefinedError | Self::BodyIsEmpty | Self::FailedMailing => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::ApiExchangeError => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn default_message(&self) -> &'static str {
        match self {
            Self::UndefinedError => "An undefined error occurred",
            Self::BodyIsEmpty => "The response body is empty",
            Self::ApiExchangeError => EXCHANGE_ERROR_MESSAGE,
            Self::FailedMailing => "Failed to send mail",
        }
    }
}

/// Uniform typed error raised to callers of a [`crate::RestClient`].
///
/// `Display` only ever shows [`DomainError::message`]; the underlying cause
/// is reachable through [`std::error::Error::source`] for diagnostics.
#[derive(Error, Debug)]
#[error("{message}")]
pub struct DomainError {
    status: Option<StatusCode>,
    code: String,
    message: String,
    #[source]
    source: Option<BoxError>,
}

impl DomainError {
    /// Build from a table entry, taking its status and default message.
    #[must_use]
    pub fn from_code(code: impl ResponseCode) -> Self {
        Self {
            status: Some(code.http_status()),
            code: code.code(),
            message: code.default_message().to_string(),
            source: None,
        }
    }

    /// Build from an explicit status, code and message.
    #[must_use]
    pub fn new(status: StatusCode, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            code: code.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Build from an explicit status, code and message, keeping the cause.
    #[must_use]
    pub fn with_cause(
        status: StatusCode,
        code: impl Into<String>,
        message: impl Into<String>,
        cause: impl Into<BoxError>,
    ) -> Self {
        Self {
            source: Some(cause.into()),
            ..Self::new(status, code, message)
        }
    }

    /// Build with the implicit `400 Bad Request` status.
    #[must_use]
    pub fn bad_request(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, code, message)
    }

    /// Build from a status alone; the code is the fixed numeric `"400"`.
    #[must_use]
    pub fn from_status(status: StatusCode, message: impl Into<String>) -> Self {
        Self::new(status, StatusCode::BAD_REQUEST.as_str(), message)
    }

    /// The fixed exchange error raised for every transport failure.
    #[must_use]
    pub fn exchange(cause: impl Into<BoxError>) -> Self {
        let code = CommonExternalCode::ApiExchangeError;
        Self::with_cause(code.http_status(), code.code(), code.default_message(), cause)
    }

    /// HTTP status of this error, if one was assigned.
    #[must_use]
    pub const fn status(&self) -> Option<StatusCode> {
        self.status
    }

    /// Stable code, e.g. `E-COM-0003`.
    #[must_use]
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Human readable message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Whether this is the transport exchange error.
    #[must_use]
    pub fn is_exchange_error(&self) -> bool {
        self.code == CommonExternalCode::ApiExchangeError.code()
    }
}

/// Fatal failure while constructing a client. Raised at startup, never per call.
#[derive(Error, Debug)]
pub enum BuildError {
    /// The TLS backend or the underlying HTTP client could not be initialized.
    #[error("failed to initialize HTTP client: {0}")]
    Client(#[from] reqwest::Error),

    /// The runtime driving the client's I/O could not be started.
    #[error("failed to start HTTP client runtime: {0}")]
    Runtime(#[from] std::io::Error),

    /// The supplied configuration is not usable.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Failure of the pooled transport while executing one call.
///
/// These never reach callers directly; the error translator turns each of
/// them into [`DomainError::exchange`].
#[derive(Error, Debug)]
pub enum TransportError {
    /// Connect, TLS, timeout or protocol failure reported by the client.
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Raw I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// No connection lease became available in time.
    #[error("connection pool exhausted for {route} after {waited:?}")]
    PoolTimeout {
        /// Route the lease was requested for
        route: String,
        /// Time spent waiting for a lease
        waited: Duration,
    },
}

/// Configuration errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A timeout was set to zero
    #[error("Invalid timeout for {0}: must be greater than 0")]
    InvalidTimeout(&'static str),

    /// A pool capacity was set to zero
    #[error("Invalid pool size for {0}: must be greater than 0")]
    InvalidPoolSize(&'static str),

    /// Per-route capacity exceeds total capacity
    #[error("Pool max per route ({per_route}) exceeds max total ({total})")]
    PerRouteExceedsTotal {
        /// Per-route capacity
        per_route: usize,
        /// Total capacity
        total: usize,
    },

    /// Environment variable parse error
    #[error("Failed to parse environment variable {name}: {reason}")]
    ParseError {
        /// Variable name
        name: String,
        /// Parser message
        reason: String,
    },
}
