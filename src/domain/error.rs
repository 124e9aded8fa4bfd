use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the appender core.
///
/// A full queue is deliberately absent: overflow is resolved by blocking or
/// discarding and is reported as [`Admission`](crate::buffer::Admission), never
/// as an error.
#[derive(Error, Debug)]
pub enum AppenderError {
    #[error("Rollover planning failed: {0}")]
    RolloverPlanning(String),

    #[error("Failed to open log target {}: {source}", .path.display())]
    RolloverIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Write to {} failed: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Dispatcher shutdown interrupted: {0}")]
    ShutdownInterrupted(String),

    #[error("Appender is closed")]
    Closed,

    #[error("Invalid appender configuration: {0}")]
    Config(String),
}

impl AppenderError {
    /// Whether the error is escalated to the configured error handler.
    pub fn is_escalated(&self) -> bool {
        matches!(
            self,
            AppenderError::RolloverIo { .. } | AppenderError::Write { .. }
        )
    }
}
