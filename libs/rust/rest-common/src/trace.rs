//! Request/response tracing for every outbound call.
//!
//! [`TracingInterceptor`] emits exactly one JSON line per call on the
//! [`REST_LOG_TARGET`] target, after the call completes and before its
//! result is handed back:
//!
//! ```json
//! {"traceId":"..","timestamp":"2024-01-01 12:00:00.000","callerId":"..",
//!  "request":{"host":"..","url":"/path","method":"GET","body":"","queryString":null},
//!  "response":{"status":200,"duration":12,"payload":".."}}
//! ```
//!
//! When no response was obtained, `status` and `duration` are `null` and
//! `payload` is empty.

use crate::context::CorrelationContext;
use crate::error::DomainError;
use crate::interceptor::{Interceptor, Next};
use crate::message::{BufferedRequest, BufferedResponse};
use chrono::Local;
use serde::Serialize;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Target of the per-call JSON log line.
pub const REST_LOG_TARGET: &str = "rest_common::rest_log";

/// Format of [`RestLog::timestamp`].
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Request half of a trace record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestTrace {
    /// Target host
    pub host: String,
    /// Target path
    pub url: String,
    /// HTTP method
    pub method: String,
    /// Request body as text
    pub body: String,
    /// Query string, if any
    pub query_string: Option<String>,
}

impl RequestTrace {
    /// Capture `request`; the body is decoded lossily for logging only.
    #[must_use]
    pub fn capture(request: &BufferedRequest) -> Self {
        Self {
            host: request.host().to_string(),
            url: request.path().to_string(),
            method: request.method().as_str().to_string(),
            body: String::from_utf8_lossy(request.body()).into_owned(),
            query_string: request.query().map(str::to_owned),
        }
    }
}

/// Response half of a trace record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResponseTrace {
    /// Status code; `None` when no response was obtained
    pub status: Option<u16>,
    /// Call duration in milliseconds; `None` when no response was obtained
    pub duration: Option<u64>,
    /// Response body as text
    pub payload: String,
}

impl ResponseTrace {
    /// Capture `response`. A body that could not be read is logged and
    /// traced as empty.
    #[must_use]
    pub fn capture(response: &BufferedResponse, duration_ms: u64) -> Self {
        let payload = response.text().unwrap_or_else(|e| {
            error!(error = %e, "failed to read response body for tracing");
            String::new()
        });

        Self {
            status: Some(response.status().as_u16()),
            duration: Some(duration_ms),
            payload,
        }
    }

    /// Trace of a call that produced no response.
    #[must_use]
    pub fn absent() -> Self {
        Self::default()
    }
}

/// One log record per outbound call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RestLog {
    /// Ambient trace identifier
    pub trace_id: String,
    /// Call start, local time
    pub timestamp: String,
    /// Ambient caller identifier
    pub caller_id: String,
    /// Request trace
    pub request: RequestTrace,
    /// Response trace
    pub response: ResponseTrace,
}

impl RestLog {
    /// Assemble a record from its parts and the correlation context.
    #[must_use]
    pub fn new(
        ctx: &CorrelationContext,
        started_at: String,
        request: RequestTrace,
        response: ResponseTrace,
    ) -> Self {
        Self {
            trace_id: ctx.current_trace_id().to_string(),
            timestamp: started_at,
            caller_id: ctx.current_caller_id().to_string(),
            request,
            response,
        }
    }

    /// Serialize to a single JSON line.
    ///
    /// # Errors
    ///
    /// Returns the serializer error.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Interceptor that records and logs every call.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingInterceptor;

impl TracingInterceptor {
    /// Create the interceptor.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn emit(log: &RestLog) {
        match log.to_json() {
            Ok(line) => info!(target: REST_LOG_TARGET, "{line}"),
            Err(e) => warn!(error = %e, "failed to serialize rest log"),
        }
    }
}

impl Interceptor for TracingInterceptor {
    fn intercept(
        &self,
        ctx: &CorrelationContext,
        request: &BufferedRequest,
        next: Next<'_>,
    ) -> Result<BufferedResponse, DomainError> {
        let timer = Instant::now();
        let started_at = Local::now().format(TIMESTAMP_FORMAT).to_string();
        let request_trace = RequestTrace::capture(request);
        debug!(
            uri = %request.url(),
            path = request.path(),
            query = request.query().unwrap_or_default(),
            method = %request.method(),
            headers = ?request.headers(),
            body = %request_trace.body,
            "outbound request"
        );

        let result = next.run(ctx, request);
        let elapsed_ms = u64::try_from(timer.elapsed().as_millis()).unwrap_or(u64::MAX);

        let response_trace = match &result {
            Ok(response) => {
                let trace = ResponseTrace::capture(response, elapsed_ms);
                debug!(
                    status = response.status().as_u16(),
                    reason = response.status().canonical_reason().unwrap_or_default(),
                    headers = ?response.headers(),
                    body = %trace.payload,
                    "outbound response"
                );
                trace
            }
            Err(_) => ResponseTrace::absent(),
        };

        Self::emit(&RestLog::new(ctx, started_at, request_trace, response_trace));
        result
    }
}
