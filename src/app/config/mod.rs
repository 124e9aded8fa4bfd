mod appender;
mod cli;
pub mod groups;
pub mod serde_helpers;
mod validation;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("File error: {0}")]
    FileError(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Environment error: {0}")]
    EnvError(String),
}

/// Verbosity of the crate's own diagnostics (not of the events it writes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl DiagnosticLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            DiagnosticLevel::Error => "error",
            DiagnosticLevel::Warn => "warn",
            DiagnosticLevel::Info => "info",
            DiagnosticLevel::Debug => "debug",
            DiagnosticLevel::Trace => "trace",
        }
    }
}

impl From<DiagnosticLevel> for tracing::Level {
    fn from(level: DiagnosticLevel) -> Self {
        match level {
            DiagnosticLevel::Error => tracing::Level::ERROR,
            DiagnosticLevel::Warn => tracing::Level::WARN,
            DiagnosticLevel::Info => tracing::Level::INFO,
            DiagnosticLevel::Debug => tracing::Level::DEBUG,
            DiagnosticLevel::Trace => tracing::Level::TRACE,
        }
    }
}

/// Output format of the diagnostic subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Compact human readable lines
    #[default]
    Fmt,
    /// One JSON object per line
    Json,
}

pub use appender::AppenderConfig;
pub use cli::Cli;
pub use groups::RollingConfig;
pub use serde_helpers::parse_size;
