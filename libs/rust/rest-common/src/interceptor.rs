//! Ordered call-wrapping chain around the pooled transport.
//!
//! Interceptors run in registration order. Each receives a [`Next`] handle
//! that runs the rest of the chain and, at its end, the [`Transport`].
//! Transport failures are translated before they reach any interceptor, so
//! the chain only ever carries [`DomainError`].
//!
//! An interceptor must return the outcome of [`Next::run`] (possibly
//! decorated); it may absorb failures of its own side work such as logging,
//! but never an error coming from further down the chain.

use crate::context::CorrelationContext;
use crate::error::{DomainError, TransportError};
use crate::message::{BodyReadError, BufferedRequest, BufferedResponse};
use crate::pool::ConnectionPool;
use crate::translate::translate_transport_failure;
use reqwest::Client;
use std::io;
use std::sync::Arc;
use tokio::runtime::{self, Runtime};

/// Hook wrapping every outbound call.
pub trait Interceptor: Send + Sync {
    /// Handle one call. Must invoke `next.run` exactly once.
    ///
    /// # Errors
    ///
    /// Returns the error produced further down the chain.
    fn intercept(
        &self,
        ctx: &CorrelationContext,
        request: &BufferedRequest,
        next: Next<'_>,
    ) -> Result<BufferedResponse, DomainError>;
}

/// Executes a buffered request on the wire.
pub trait Transport: Send + Sync {
    /// Send `request` and buffer the full response body.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] when no response was obtained.
    fn execute(&self, request: &BufferedRequest) -> Result<BufferedResponse, TransportError>;
}

/// Remainder of the chain for one call.
pub struct Next<'a> {
    interceptors: &'a [Arc<dyn Interceptor>],
    transport: &'a dyn Transport,
}

impl<'a> Next<'a> {
    /// Start of a chain over `interceptors` ending at `transport`.
    #[must_use]
    pub fn new(interceptors: &'a [Arc<dyn Interceptor>], transport: &'a dyn Transport) -> Self {
        Self { interceptors, transport }
    }

    /// Run the remaining interceptors, then the transport.
    ///
    /// # Errors
    ///
    /// Returns the first error raised down the chain; transport failures
    /// arrive as the exchange error.
    pub fn run(
        self,
        ctx: &CorrelationContext,
        request: &BufferedRequest,
    ) -> Result<BufferedResponse, DomainError> {
        match self.interceptors.split_first() {
            Some((current, rest)) => {
                current.intercept(ctx, request, Next::new(rest, self.transport))
            }
            None => self
                .transport
                .execute(request)
                .map_err(translate_transport_failure),
        }
    }
}

/// Reqwest transport gated by a [`ConnectionPool`].
///
/// The async client runs on a small runtime owned by the transport and the
/// calling thread blocks until the response body is buffered. Calls must
/// therefore not be made from inside an async task.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
    pool: ConnectionPool,
    runtime: Arc<Runtime>,
}

impl ReqwestTransport {
    /// Wrap an already configured client and its lease pool.
    ///
    /// # Errors
    ///
    /// Returns an error if the I/O runtime cannot be started.
    pub fn new(client: Client, pool: ConnectionPool) -> io::Result<Self> {
        let runtime = runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("rest-common-io")
            .enable_all()
            .build()?;

        Ok(Self {
            client,
            pool,
            runtime: Arc::new(runtime),
        })
    }

    /// Lease pool used by this transport.
    #[must_use]
    pub const fn pool(&self) -> &ConnectionPool {
        &self.pool
    }
}

impl Transport for ReqwestTransport {
    fn execute(&self, request: &BufferedRequest) -> Result<BufferedResponse, TransportError> {
        let _lease = self.pool.acquire(request.url())?;

        let pending = self
            .client
            .request(request.method().clone(), request.url().clone())
            .headers(request.headers().clone())
            .body(request.body().clone());

        self.runtime.block_on(async move {
            let response = pending.send().await?;

            let status = response.status();
            let headers = response.headers().clone();
            let body = response
                .bytes()
                .await
                .map_err(|e| BodyReadError::new(e.to_string()));

            Ok::<_, TransportError>(BufferedResponse::new(status, headers, body))
        })
    }
}
