//! In-memory capture of `tracing` output.
//!
//! Events are formatted without timestamps or levels, one per line, as
//! `target: message fields`.

use parking_lot::Mutex;
use rest_common::REST_LOG_TARGET;
use std::io;
use std::sync::Arc;
use tracing::Level;
use tracing_subscriber::fmt::MakeWriter;

/// Lines written while a closure ran under [`capture_logs`].
#[derive(Debug, Clone, Default)]
pub struct CapturedLogs {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl CapturedLogs {
    /// All captured lines.
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        String::from_utf8_lossy(&self.buffer.lock())
            .lines()
            .map(str::to_owned)
            .collect()
    }

    /// Parsed JSON records written on the rest log target.
    ///
    /// # Panics
    ///
    /// Panics if a rest log line is not valid JSON.
    #[must_use]
    pub fn rest_logs(&self) -> Vec<serde_json::Value> {
        let prefix = format!("{REST_LOG_TARGET}: ");
        self.lines()
            .iter()
            .filter_map(|line| line.split_once(&prefix).map(|(_, json)| json.to_owned()))
            .map(|json| serde_json::from_str(&json).expect("rest log line is JSON"))
            .collect()
    }

    /// Lines containing `needle`.
    #[must_use]
    pub fn containing(&self, needle: &str) -> Vec<String> {
        self.lines()
            .into_iter()
            .filter(|line| line.contains(needle))
            .collect()
    }
}

/// Writer handed to the formatter for each event.
#[derive(Debug)]
pub struct CaptureWriter {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl io::Write for CaptureWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for CapturedLogs {
    type Writer = CaptureWriter;

    fn make_writer(&'a self) -> Self::Writer {
        CaptureWriter {
            buffer: Arc::clone(&self.buffer),
        }
    }
}

/// Run `f` with a thread-local subscriber capturing every event at
/// `DEBUG` and above.
pub fn capture_logs<T>(f: impl FnOnce() -> T) -> (T, CapturedLogs) {
    let logs = CapturedLogs::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(logs.clone())
        .with_ansi(false)
        .without_time()
        .with_level(false)
        .with_target(true)
        .with_max_level(Level::DEBUG)
        .finish();

    let value = tracing::subscriber::with_default(subscriber, f);
    (value, logs)
}
