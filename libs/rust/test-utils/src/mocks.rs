//! Transport doubles for exercising the call chain without a network.

use parking_lot::Mutex;
use reqwest::StatusCode;
use rest_common::{BodyReadError, BufferedRequest, BufferedResponse, Transport, TransportError};
use std::collections::VecDeque;
use std::io;

/// Outcome a [`ScriptedTransport`] produces for one call.
#[derive(Debug, Clone)]
pub enum StubOutcome {
    /// A response with this status and body
    Respond(StatusCode, String),
    /// A response whose body could not be buffered
    BrokenBody(StatusCode),
    /// An I/O failure of the given kind
    Fail(io::ErrorKind),
}

/// Replays scripted outcomes in order; the last one repeats once the
/// script is exhausted.
#[derive(Debug)]
pub struct ScriptedTransport {
    script: Mutex<VecDeque<StubOutcome>>,
    last: Mutex<Option<StubOutcome>>,
    requests: Mutex<Vec<BufferedRequest>>,
}

impl ScriptedTransport {
    /// Transport replaying `outcomes`.
    #[must_use]
    pub fn new(outcomes: impl IntoIterator<Item = StubOutcome>) -> Self {
        Self {
            script: Mutex::new(outcomes.into_iter().collect()),
            last: Mutex::new(None),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Transport that always answers `status` with `body`.
    #[must_use]
    pub fn responding(status: StatusCode, body: impl Into<String>) -> Self {
        Self::new([StubOutcome::Respond(status, body.into())])
    }

    /// Transport that always fails with `kind`.
    #[must_use]
    pub fn failing(kind: io::ErrorKind) -> Self {
        Self::new([StubOutcome::Fail(kind)])
    }

    /// Requests received so far.
    #[must_use]
    pub fn requests(&self) -> Vec<BufferedRequest> {
        self.requests.lock().clone()
    }

    /// Number of calls received.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.requests.lock().len()
    }

    fn next_outcome(&self) -> Option<StubOutcome> {
        let mut last = self.last.lock();
        if let Some(outcome) = self.script.lock().pop_front() {
            *last = Some(outcome);
        }
        last.clone()
    }
}

impl Transport for ScriptedTransport {
    fn execute(&self, request: &BufferedRequest) -> Result<BufferedResponse, TransportError> {
        self.requests.lock().push(request.clone());

        match self.next_outcome() {
            Some(StubOutcome::Respond(status, body)) => {
                Ok(BufferedResponse::from_bytes(status, body))
            }
            Some(StubOutcome::BrokenBody(status)) => Ok(BufferedResponse::new(
                status,
                reqwest::header::HeaderMap::new(),
                Err(BodyReadError::new("connection reset while reading body")),
            )),
            Some(StubOutcome::Fail(kind)) => {
                Err(io::Error::new(kind, "scripted transport failure").into())
            }
            None => Err(io::Error::new(io::ErrorKind::NotConnected, "empty script").into()),
        }
    }
}
