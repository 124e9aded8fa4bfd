use super::{AppenderConfig, ConfigError, DiagnosticLevel, LogFormat, parse_size};
use crate::domain::LogLevel;
use crate::render::Layout;
use crate::rotation::RotationInterval;
use clap::Parser;
use std::path::PathBuf;

/// Pipe stdin lines into a rolling log file.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Active log file (overrides the configuration)
    #[arg(long, env = "APPENDER_FILE")]
    pub file: Option<PathBuf>,

    /// TOML configuration file; `APPENDER_*` variables are used when absent
    #[arg(long, env = "APPENDER_CONFIG_FILE")]
    pub config_file: Option<PathBuf>,

    /// Appender name used in diagnostics and thread names
    #[arg(long)]
    pub name: Option<String>,

    /// Queue capacity; 0 writes synchronously
    #[arg(long)]
    pub buffer_capacity: Option<usize>,

    /// Drop and summarise events instead of blocking when the queue is full
    #[arg(long)]
    pub non_blocking: bool,

    /// Roll over once the active file reaches this size (e.g. 10MB)
    #[arg(long, value_parser = parse_size)]
    pub max_file_size: Option<u64>,

    /// Number of rotated files kept in the fixed window
    #[arg(long)]
    pub max_backups: Option<u32>,

    /// Event layout
    #[arg(long)]
    pub layout: Option<Layout>,

    /// Also roll over when the minute, hour or day changes
    #[arg(long)]
    pub rotation_interval: Option<RotationInterval>,

    /// Level of the tool's own diagnostics
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: DiagnosticLevel,

    /// Format of the tool's own diagnostics
    #[arg(long, env = "LOG_FORMAT", default_value = "fmt")]
    pub log_format: LogFormat,

    /// Level of lines without a recognised level prefix
    #[arg(long, default_value = "info")]
    pub default_level: LogLevel,

    /// Source recorded on every event
    #[arg(long, default_value = "stdin")]
    pub source: String,
}

impl Cli {
    /// Configuration from `--config-file` (or the environment), with the
    /// explicit flags layered on top.
    pub fn appender_config(&self) -> Result<AppenderConfig, ConfigError> {
        let mut config = match &self.config_file {
            Some(path) => AppenderConfig::from_file(path)?,
            None => AppenderConfig::from_env()?,
        };

        if let Some(file) = &self.file {
            config.file = file.clone();
        }
        if let Some(name) = &self.name {
            config.name = name.clone();
        }
        if let Some(capacity) = self.buffer_capacity {
            config.buffer_capacity = capacity;
        }
        if self.non_blocking {
            config.blocking = false;
        }
        if let Some(size) = self.max_file_size {
            config.max_file_size = size;
        }
        if let Some(backups) = self.max_backups {
            config.set_max_backups(backups);
        }
        if let Some(layout) = self.layout {
            config.layout = layout;
        }
        if self.rotation_interval.is_some() {
            config.rotation_interval = self.rotation_interval;
        }

        config.validate()?;
        Ok(config)
    }
}
