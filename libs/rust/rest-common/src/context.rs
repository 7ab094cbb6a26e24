//! Correlation identifiers threaded explicitly through every outbound call.
//!
//! Lookups are best effort: anything missing becomes an empty string and
//! never fails the call.

use reqwest::header::HeaderMap;

/// Session attribute holding the acting member id.
pub const MEMBER_ID: &str = "memid";

/// Inbound header carrying the trace identifier.
pub const TRACE_ID_HEADER: &str = "x-trace-id";

/// Inbound header carrying the caller identifier.
pub const CALLER_ID_HEADER: &str = "x-caller-id";

/// Ambient source of correlation values, e.g. the inbound request being served.
pub trait CorrelationSource {
    /// Trace identifier of the current unit of work.
    fn trace_id(&self) -> Option<String>;

    /// Session attribute of the acting caller.
    fn session_attribute(&self, key: &str) -> Option<String>;
}

/// Trace and caller identifiers of the current unit of work.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CorrelationContext {
    trace_id: String,
    caller_id: String,
}

impl CorrelationContext {
    /// Context with both identifiers empty, for calls outside a served request.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Context with explicit identifiers.
    #[must_use]
    pub fn new(trace_id: impl Into<String>, caller_id: impl Into<String>) -> Self {
        Self {
            trace_id: trace_id.into(),
            caller_id: caller_id.into(),
        }
    }

    /// Read both identifiers from `source`; missing values become `""`.
    #[must_use]
    pub fn from_source(source: &dyn CorrelationSource) -> Self {
        Self {
            trace_id: source.trace_id().unwrap_or_default(),
            caller_id: source.session_attribute(MEMBER_ID).unwrap_or_default(),
        }
    }

    /// Current trace identifier, `""` if none.
    #[must_use]
    pub fn current_trace_id(&self) -> &str {
        &self.trace_id
    }

    /// Current caller identifier, `""` if none.
    #[must_use]
    pub fn current_caller_id(&self) -> &str {
        &self.caller_id
    }
}

/// Reads correlation values from the headers of an inbound request.
#[derive(Debug, Clone, Copy)]
pub struct HeaderCorrelationSource<'a> {
    headers: &'a HeaderMap,
}

impl<'a> HeaderCorrelationSource<'a> {
    /// Wrap inbound request headers.
    #[must_use]
    pub const fn new(headers: &'a HeaderMap) -> Self {
        Self { headers }
    }

    fn header(&self, name: &str) -> Option<String> {
        self.headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned)
    }
}

impl CorrelationSource for HeaderCorrelationSource<'_> {
    fn trace_id(&self) -> Option<String> {
        self.header(TRACE_ID_HEADER)
    }

    fn session_attribute(&self, key: &str) -> Option<String> {
        (key == MEMBER_ID)
            .then(|| self.header(CALLER_ID_HEADER))
            .flatten()
    }
}
