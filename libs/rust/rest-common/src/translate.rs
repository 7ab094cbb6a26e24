//! Classification of call outcomes into the error taxonomy.
//!
//! Transport failures raise the exchange error; a received response with a
//! status other than 200 is only flagged and logged, then handed back to the
//! caller unchanged.

use crate::error::{DomainError, TransportError};
use crate::message::BufferedResponse;
use reqwest::StatusCode;
use std::error::Error as _;
use tracing::error;

/// Translate any transport failure into the fixed exchange error.
///
/// The full cause chain is logged here; callers only see the fixed
/// status, code and message.
#[must_use]
pub fn translate_transport_failure(err: TransportError) -> DomainError {
    error!(error = %err, causes = %cause_chain(&err), "outbound API exchange failed");
    DomainError::exchange(err)
}

fn cause_chain(err: &TransportError) -> String {
    let mut chain = Vec::new();
    let mut current = err.source();
    while let Some(cause) = current {
        chain.push(cause.to_string());
        current = cause.source();
    }
    chain.join(" <- ")
}

/// Status-based classifier applied to every received response.
pub trait ResponseErrorHandler: Send + Sync {
    /// Whether `response` counts as an error.
    fn has_error(&self, response: &BufferedResponse) -> bool;

    /// Called for responses flagged by [`ResponseErrorHandler::has_error`].
    /// Must not fail; the response is still returned to the caller.
    fn handle_error(&self, response: &BufferedResponse);
}

/// Treats every status except exactly `200 OK` as an error and logs it.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatusOkOnly;

impl ResponseErrorHandler for StatusOkOnly {
    fn has_error(&self, response: &BufferedResponse) -> bool {
        response.status() != StatusCode::OK
    }

    fn handle_error(&self, response: &BufferedResponse) {
        error!("check rest client, http code={}", response.status().as_u16());
    }
}
