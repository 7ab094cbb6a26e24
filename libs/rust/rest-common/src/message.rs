//! Fully buffered request and response values.
//!
//! Both sides hold their body as [`Bytes`], so the tracing interceptor and
//! the caller can each read a body without consuming it.

use crate::error::{CommonExternalCode, DomainError, ResponseCode};
use bytes::Bytes;
use reqwest::header::HeaderMap;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use thiserror::Error;
use url::Url;

/// The response body could not be read from the wire.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("failed to read response body: {reason}")]
pub struct BodyReadError {
    reason: String,
}

impl BodyReadError {
    /// Create from a reader failure description.
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self { reason: reason.into() }
    }
}

/// Outbound request with its body already in memory.
#[derive(Debug, Clone)]
pub struct BufferedRequest {
    method: Method,
    url: Url,
    headers: HeaderMap,
    body: Bytes,
}

impl BufferedRequest {
    /// Create a request without headers or body.
    #[must_use]
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    /// Replace the headers.
    #[must_use]
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// Replace the body.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// HTTP method.
    #[must_use]
    pub const fn method(&self) -> &Method {
        &self.method
    }

    /// Full target URL.
    #[must_use]
    pub const fn url(&self) -> &Url {
        &self.url
    }

    /// Request headers.
    #[must_use]
    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Mutable request headers, for interceptors that decorate the call.
    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Raw body bytes, sent unmodified.
    #[must_use]
    pub const fn body(&self) -> &Bytes {
        &self.body
    }

    /// Target host, empty when the URL has none.
    #[must_use]
    pub fn host(&self) -> &str {
        self.url.host_str().unwrap_or_default()
    }

    /// Target path.
    #[must_use]
    pub fn path(&self) -> &str {
        self.url.path()
    }

    /// Query string without the leading `?`.
    #[must_use]
    pub fn query(&self) -> Option<&str> {
        self.url.query()
    }
}

/// Response whose body has been read into memory once by the transport.
#[derive(Debug, Clone)]
pub struct BufferedResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Result<Bytes, BodyReadError>,
}

impl BufferedResponse {
    /// Create from parts; `body` carries the outcome of buffering.
    #[must_use]
    pub const fn new(
        status: StatusCode,
        headers: HeaderMap,
        body: Result<Bytes, BodyReadError>,
    ) -> Self {
        Self { status, headers, body }
    }

    /// Create a response with a successfully buffered body.
    #[must_use]
    pub fn from_bytes(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self::new(status, HeaderMap::new(), Ok(body.into()))
    }

    /// HTTP status code.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Response headers.
    #[must_use]
    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Body bytes. Repeatable; the buffer is shared, not consumed.
    ///
    /// # Errors
    ///
    /// Returns the failure recorded while the transport buffered the body.
    pub fn bytes(&self) -> Result<Bytes, BodyReadError> {
        self.body.clone()
    }

    /// Body decoded as UTF-8, replacing invalid sequences.
    ///
    /// # Errors
    ///
    /// Returns the failure recorded while the transport buffered the body.
    pub fn text(&self) -> Result<String, BodyReadError> {
        self.body
            .as_ref()
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
            .map_err(Clone::clone)
    }

    /// Deserialize the body as JSON.
    ///
    /// # Errors
    ///
    /// An unreadable or empty body yields `BodyIsEmpty`; a body that is not
    /// valid JSON for `T` yields `UndefinedError`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, DomainError> {
        let empty = CommonExternalCode::BodyIsEmpty;
        let bytes = match &self.body {
            Ok(bytes) if !bytes.is_empty() => bytes,
            Ok(_) => return Err(DomainError::from_code(empty)),
            Err(e) => {
                return Err(DomainError::with_cause(
                    empty.http_status(),
                    empty.code(),
                    empty.default_message(),
                    e.clone(),
                ));
            }
        };

        serde_json::from_slice(bytes).map_err(|e| {
            let undefined = CommonExternalCode::UndefinedError;
            DomainError::with_cause(
                undefined.http_status(),
                undefined.code(),
                undefined.default_message(),
                e,
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Payload {
        id: u32,
    }

    #[test]
    fn test_request_url_parts() {
        let url = Url::parse("https://api.example.com/v1/users?page=2&size=10").unwrap();
        let request = BufferedRequest::new(Method::GET, url);

        assert_eq!(request.host(), "api.example.com");
        assert_eq!(request.path(), "/v1/users");
        assert_eq!(request.query(), Some("page=2&size=10"));
        assert!(request.body().is_empty());
    }

    #[test]
    fn test_body_is_readable_repeatedly() {
        let response = BufferedResponse::from_bytes(StatusCode::OK, r#"{"id":7}"#);

        assert_eq!(response.text().unwrap(), r#"{"id":7}"#);
        assert_eq!(response.text().unwrap(), r#"{"id":7}"#);
        assert_eq!(response.json::<Payload>().unwrap(), Payload { id: 7 });
        assert_eq!(response.bytes().unwrap().as_ref(), br#"{"id":7}"#);
    }

    #[test]
    fn test_invalid_utf8_is_lossy() {
        let response = BufferedResponse::from_bytes(StatusCode::OK, vec![b'o', b'k', 0xff]);
        assert_eq!(response.text().unwrap(), "ok\u{fffd}");
    }

    #[test]
    fn test_json_empty_body() {
        let response = BufferedResponse::from_bytes(StatusCode::OK, Bytes::new());
        let err = response.json::<Payload>().unwrap_err();
        assert_eq!(err.code(), "E-COM-0002");
    }

    #[test]
    fn test_json_malformed_body() {
        let response = BufferedResponse::from_bytes(StatusCode::OK, "not json");
        let err = response.json::<Payload>().unwrap_err();
        assert_eq!(err.code(), "E-COM-0001");
    }

    #[test]
    fn test_failed_body_read_is_reported() {
        let response = BufferedResponse::new(
            StatusCode::OK,
            HeaderMap::new(),
            Err(BodyReadError::new("connection reset")),
        );
        assert!(response.text().is_err());
        assert_eq!(response.json::<Payload>().unwrap_err().code(), "E-COM-0002");
    }
}
