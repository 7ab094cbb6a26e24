//! Shared outbound HTTP plumbing for backend services.
//!
//! This crate provides:
//! - A client factory with pooled connections and named timeout profiles
//! - A tracing interceptor that logs one JSON record per outbound call
//! - A uniform error taxonomy with stable `E-COM-0000` codes
//! - Explicit correlation context (trace id, caller id)
//! - A templated mail boundary
//!
//! ```no_run
//! use rest_common::{ClientFactory, CorrelationContext, RestClientConfig};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let clients = ClientFactory::new(RestClientConfig::default()).build_profiles()?;
//! let ctx = CorrelationContext::new("4bf92f3577b34da6", "member-42");
//! let response = clients.primary.get("https://api.example.com/v1/status")?.send(&ctx)?;
//! println!("{} {}", response.status(), response.text()?);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod client;
pub mod config;
pub mod context;
pub mod error;
pub mod factory;
pub mod interceptor;
pub mod mail;
pub mod message;
pub mod pool;
pub mod trace;
pub mod tracing_config;
pub mod translate;

pub use client::{RequestBuilder, RestClient};
pub use config::{ClientProfile, RestClientConfig};
pub use context::{CorrelationContext, CorrelationSource, HeaderCorrelationSource};
pub use error::{BuildError, CommonExternalCode, ConfigError, DomainError, ResponseCode, TransportError};
pub use factory::{ClientFactory, RestClients};
pub use interceptor::{Interceptor, Next, ReqwestTransport, Transport};
pub use message::{BodyReadError, BufferedRequest, BufferedResponse};
pub use pool::{ConnectionPool, PoolLimits, PoolStats};
pub use trace::{REST_LOG_TARGET, RestLog, TracingInterceptor};
pub use tracing_config::{TracingConfig, init_tracing};
pub use translate::{ResponseErrorHandler, StatusOkOnly};
