use super::config::{DiagnosticLevel, LogFormat};
use std::sync::OnceLock;
use thiserror::Error;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Error, Debug)]
pub enum InitializationError {
    #[error("Invalid log directive '{directive}'")]
    InvalidDirective {
        directive: String,
        #[source]
        source: tracing_subscriber::filter::ParseError,
    },

    #[error("Logging system initialization failed: {details}")]
    LoggingInitFailed {
        details: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// Diagnostics go to stderr; stdout stays free for piping.
pub struct LoggingSystem {
    level: DiagnosticLevel,
    format: LogFormat,
    directives: Vec<String>,
}

impl LoggingSystem {
    pub fn new(level: DiagnosticLevel, format: LogFormat) -> Self {
        Self {
            level,
            format,
            directives: Vec::new(),
        }
    }

    /// Add a per-target directive such as `rolling_appender::rotation=debug`.
    pub fn add_directive(&mut self, directive: &str) -> Result<(), InitializationError> {
        directive
            .parse::<tracing_subscriber::filter::Directive>()
            .map_err(|source| InitializationError::InvalidDirective {
                directive: directive.to_string(),
                source,
            })?;
        self.directives.push(directive.to_string());
        Ok(())
    }

    /// `RUST_LOG` wins when set; otherwise the level plus extra directives.
    pub fn build_filter_string(&self) -> String {
        let mut parts = Vec::with_capacity(self.directives.len() + 1);
        parts.push(self.level.as_str().to_string());
        parts.extend(self.directives.iter().cloned());
        parts.join(",")
    }

    fn env_filter(&self) -> Result<EnvFilter, InitializationError> {
        if let Ok(filter) = EnvFilter::try_from_default_env() {
            return Ok(filter);
        }
        let filter_string = self.build_filter_string();
        EnvFilter::try_new(&filter_string).map_err(|e| InitializationError::LoggingInitFailed {
            details: format!("Failed to create EnvFilter with '{filter_string}'"),
            source: Box::new(e),
        })
    }

    pub fn initialize_tracing(&self) -> Result<(), InitializationError> {
        let env_filter = self.env_filter()?;
        let registry = tracing_subscriber::registry().with(env_filter);

        let result = match self.format {
            LogFormat::Json => tracing::subscriber::set_global_default(
                registry.with(
                    fmt::layer()
                        .json()
                        .flatten_event(true)
                        .with_current_span(true)
                        .with_writer(std::io::stderr),
                ),
            ),
            LogFormat::Fmt => tracing::subscriber::set_global_default(
                registry.with(
                    fmt::layer()
                        .with_target(true)
                        .with_thread_names(true)
                        .with_level(true)
                        .with_writer(std::io::stderr)
                        .compact(),
                ),
            ),
        };

        result.map_err(|e| InitializationError::LoggingInitFailed {
            details: "Failed to set global tracing subscriber".to_string(),
            source: Box::new(e),
        })
    }
}

/// Install the global subscriber once; later calls report the first outcome.
pub fn setup_logging_safe(level: DiagnosticLevel, format: LogFormat) -> Result<(), InitializationError> {
    static INIT: OnceLock<bool> = OnceLock::new();

    let initialized = *INIT.get_or_init(|| {
        let logging_system = LoggingSystem::new(level, format);
        match logging_system.initialize_tracing() {
            Ok(()) => true,
            Err(e) => {
                eprintln!("Warning: {e}");
                false
            }
        }
    });

    if initialized {
        Ok(())
    } else {
        Err(InitializationError::LoggingInitFailed {
            details: "Logging system initialization failed".to_string(),
            source: Box::new(std::io::Error::other("Logging initialization error")),
        })
    }
}
