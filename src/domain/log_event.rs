use super::context;
use super::log_level::LogLevel;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::error::Error as StdError;
use std::fmt::Write as _;

/// Immutable snapshot of one log occurrence.
///
/// Everything that depends on the producing thread (thread name, diagnostic
/// context) is captured when the event is built. Once an event is handed to
/// the appender it is only ever read.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogEvent {
    timestamp: DateTime<Utc>,
    level: LogLevel,
    source: String,
    message: String,
    thread_name: Option<String>,
    context: BTreeMap<String, String>,
    failure: Option<String>,
}

impl LogEvent {
    /// Capture an event on the current thread.
    pub fn new(level: LogLevel, source: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            level,
            source: source.into(),
            message: message.into(),
            thread_name: std::thread::current().name().map(str::to_owned),
            context: context::snapshot(),
            failure: None,
        }
    }

    #[must_use]
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = Some(name.into());
        self
    }

    /// Attach an already formatted failure trace.
    #[must_use]
    pub fn with_failure_trace(mut self, trace: impl Into<String>) -> Self {
        self.failure = Some(trace.into());
        self
    }

    /// Attach an error, formatted eagerly together with its `source()` chain.
    #[must_use]
    pub fn with_error(self, error: &(dyn StdError + 'static)) -> Self {
        let trace = format_error_chain(error);
        self.with_failure_trace(trace)
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn level(&self) -> LogLevel {
        self.level
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn thread_name(&self) -> Option<&str> {
        self.thread_name.as_deref()
    }

    pub fn context(&self) -> &BTreeMap<String, String> {
        &self.context
    }

    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }
}

/// `error` on the first line, then one `caused by:` line per source.
fn format_error_chain(error: &(dyn StdError + 'static)) -> String {
    let mut trace = error.to_string();
    let mut current = error.source();
    while let Some(cause) = current {
        let _ = write!(trace, "\ncaused by: {cause}");
        current = cause.source();
    }
    trace
}
