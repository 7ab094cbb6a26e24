//! Shared test utilities for rest-common.
//!
//! This crate provides:
//! - Log capture for asserting on emitted rest log lines
//! - Scripted transports standing in for the network
//! - Proptest generators for correlation ids, URLs and statuses
//! - Test fixtures with sample requests and contexts

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod capture;
pub mod fixtures;
pub mod generators;
pub mod mocks;

pub use capture::{CapturedLogs, capture_logs};
pub use generators::*;
pub use mocks::{ScriptedTransport, StubOutcome};
