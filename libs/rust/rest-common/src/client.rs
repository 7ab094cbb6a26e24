//! Traced, pooled blocking HTTP client.

use crate::context::CorrelationContext;
use crate::error::{CommonExternalCode, DomainError, ResponseCode};
use crate::interceptor::{Interceptor, Next, Transport};
use crate::message::{BufferedRequest, BufferedResponse};
use crate::translate::ResponseErrorHandler;
use bytes::Bytes;
use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

struct Inner {
    transport: Arc<dyn Transport>,
    interceptors: Vec<Arc<dyn Interceptor>>,
    error_handler: Arc<dyn ResponseErrorHandler>,
    read_timeout: Duration,
}

/// HTTP client that runs every call through its interceptor chain and
/// status classifier.
///
/// Cheap to clone; clones share the connection pool.
#[derive(Clone)]
pub struct RestClient {
    inner: Arc<Inner>,
}

impl RestClient {
    /// Assemble a client from its parts.
    ///
    /// [`crate::ClientFactory`] is the usual way to get one; this is exposed
    /// for custom transports.
    #[must_use]
    pub fn from_parts(
        transport: Arc<dyn Transport>,
        interceptors: Vec<Arc<dyn Interceptor>>,
        error_handler: Arc<dyn ResponseErrorHandler>,
        read_timeout: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                transport,
                interceptors,
                error_handler,
                read_timeout,
            }),
        }
    }

    /// Read timeout of this client's profile.
    #[must_use]
    pub fn read_timeout(&self) -> Duration {
        self.inner.read_timeout
    }

    /// Number of registered interceptors.
    #[must_use]
    pub fn interceptor_count(&self) -> usize {
        self.inner.interceptors.len()
    }

    /// Execute one call.
    ///
    /// Responses with any status are returned; statuses other than 200 are
    /// only flagged and logged by the status classifier.
    ///
    /// # Errors
    ///
    /// Returns the exchange error when no response was obtained, or any
    /// error raised by an interceptor.
    pub fn execute(
        &self,
        ctx: &CorrelationContext,
        request: &BufferedRequest,
    ) -> Result<BufferedResponse, DomainError> {
        let response = Next::new(&self.inner.interceptors, self.inner.transport.as_ref())
            .run(ctx, request)?;

        let handler = &self.inner.error_handler;
        if handler.has_error(&response) {
            handler.handle_error(&response);
        }
        Ok(response)
    }

    /// Start a request to an absolute URL.
    ///
    /// # Errors
    ///
    /// Returns a `400` error when `url` does not parse.
    pub fn request(&self, method: Method, url: &str) -> Result<RequestBuilder, DomainError> {
        let url = Url::parse(url).map_err(|e| {
            let code = CommonExternalCode::UndefinedError;
            DomainError::with_cause(
                StatusCode::BAD_REQUEST,
                code.code(),
                format!("invalid request URL: {url}"),
                e,
            )
        })?;
        Ok(RequestBuilder::new(self.clone(), method, url))
    }

    /// Start a GET request.
    ///
    /// # Errors
    ///
    /// See [`RestClient::request`].
    pub fn get(&self, url: &str) -> Result<RequestBuilder, DomainError> {
        self.request(Method::GET, url)
    }

    /// Start a POST request.
    ///
    /// # Errors
    ///
    /// See [`RestClient::request`].
    pub fn post(&self, url: &str) -> Result<RequestBuilder, DomainError> {
        self.request(Method::POST, url)
    }

    /// Start a PUT request.
    ///
    /// # Errors
    ///
    /// See [`RestClient::request`].
    pub fn put(&self, url: &str) -> Result<RequestBuilder, DomainError> {
        self.request(Method::PUT, url)
    }

    /// Start a PATCH request.
    ///
    /// # Errors
    ///
    /// See [`RestClient::request`].
    pub fn patch(&self, url: &str) -> Result<RequestBuilder, DomainError> {
        self.request(Method::PATCH, url)
    }

    /// Start a DELETE request.
    ///
    /// # Errors
    ///
    /// See [`RestClient::request`].
    pub fn delete(&self, url: &str) -> Result<RequestBuilder, DomainError> {
        self.request(Method::DELETE, url)
    }
}

impl fmt::Debug for RestClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RestClient")
            .field("read_timeout", &self.inner.read_timeout)
            .field("interceptors", &self.inner.interceptors.len())
            .finish_non_exhaustive()
    }
}

/// Builder for one call on a [`RestClient`].
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    client: RestClient,
    method: Method,
    url: Url,
    headers: HeaderMap,
    body: Bytes,
}

impl RequestBuilder {
    fn new(client: RestClient, method: Method, url: Url) -> Self {
        Self {
            client,
            method,
            url,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    /// Target URL.
    #[must_use]
    pub const fn url(&self) -> &Url {
        &self.url
    }

    /// Add a header.
    ///
    /// # Errors
    ///
    /// Returns a `400` error when the name or value is not a valid header.
    pub fn header(mut self, name: &str, value: &str) -> Result<Self, DomainError> {
        let name = HeaderName::from_bytes(name.as_bytes()).map_err(invalid_header)?;
        let value = HeaderValue::from_str(value).map_err(invalid_header)?;
        self.headers.append(name, value);
        Ok(self)
    }

    /// Add an `Authorization: Bearer` header.
    ///
    /// # Errors
    ///
    /// Returns a `400` error when the token is not a valid header value.
    pub fn bearer_auth(mut self, token: &str) -> Result<Self, DomainError> {
        let value = HeaderValue::from_str(&format!("Bearer {token}")).map_err(invalid_header)?;
        self.headers.insert(header::AUTHORIZATION, value);
        Ok(self)
    }

    /// Append a query parameter.
    #[must_use]
    pub fn query(mut self, key: &str, value: &str) -> Self {
        self.url.query_pairs_mut().append_pair(key, value);
        self
    }

    /// Set a raw body.
    #[must_use]
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Set a JSON body and content type.
    ///
    /// # Errors
    ///
    /// Returns an `UndefinedError` when `value` cannot be serialized.
    pub fn json<T: Serialize + ?Sized>(mut self, value: &T) -> Result<Self, DomainError> {
        let body = serde_json::to_vec(value).map_err(|e| {
            let code = CommonExternalCode::UndefinedError;
            DomainError::with_cause(code.http_status(), code.code(), code.default_message(), e)
        })?;
        self.headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        self.body = Bytes::from(body);
        Ok(self)
    }

    /// Finish into a [`BufferedRequest`] without sending it.
    #[must_use]
    pub fn build(self) -> BufferedRequest {
        BufferedRequest::new(self.method, self.url)
            .with_headers(self.headers)
            .with_body(self.body)
    }

    /// Send through the client.
    ///
    /// # Errors
    ///
    /// See [`RestClient::execute`].
    pub fn send(self, ctx: &CorrelationContext) -> Result<BufferedResponse, DomainError> {
        let client = self.client.clone();
        client.execute(ctx, &self.build())
    }
}

fn invalid_header(err: impl Into<crate::error::BoxError>) -> DomainError {
    DomainError::with_cause(
        StatusCode::BAD_REQUEST,
        CommonExternalCode::UndefinedError.code(),
        "invalid request header",
        err,
    )
}
