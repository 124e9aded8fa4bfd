use super::groups::{DEFAULT_MIN_INDEX, RollingConfig};
use super::serde_helpers::{
    load_env_path, load_env_size, load_env_string, load_env_var, load_env_var_opt,
};
use super::ConfigError;
use crate::render::Layout;
use crate::rotation::RotationInterval;
use crate::rotation::policy::DEFAULT_MAX_FILE_SIZE;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Everything needed to build an appender, loadable from TOML or `APPENDER_*`
/// environment variables.
///
/// ```toml
/// name = "api"
/// file = "/var/log/api/app.log"
/// buffer_capacity = 512
/// max_file_size = "50MB"
/// rotation_interval = "day"
///
/// [rolling]
/// kind = "fixed_window"
/// file_pattern = "/var/log/api/app.%i.log.gz"
/// max_index = 10
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppenderConfig {
    pub name: String,
    pub file: PathBuf,
    pub append: bool,
    /// 0 writes every event synchronously on the producing thread.
    pub buffer_capacity: usize,
    pub blocking: bool,
    pub immediate_flush: bool,
    pub buffered_io: bool,
    pub io_buffer_size: usize,
    pub layout: Layout,
    #[serde(with = "super::serde_helpers::byte_size")]
    pub max_file_size: u64,
    pub rotation_interval: Option<RotationInterval>,
    pub rolling: RollingConfig,
}

impl Default for AppenderConfig {
    fn default() -> Self {
        Self {
            name: "rolling".to_string(),
            file: PathBuf::from("logs/app.log"),
            append: true,
            buffer_capacity: 128,
            blocking: true,
            immediate_flush: true,
            buffered_io: false,
            io_buffer_size: 8 * 1024,
            layout: Layout::Pattern,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            rotation_interval: None,
            rolling: RollingConfig::default(),
        }
    }
}

impl AppenderConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: AppenderConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults overridden by `APPENDER_*` variables. `APPENDER_CONFIG` may
    /// hold a whole TOML document, which the individual variables then refine.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = match std::env::var("APPENDER_CONFIG") {
            Ok(inline) => toml::from_str(&inline)?,
            Err(_) => AppenderConfig::default(),
        };

        load_env_string("APPENDER_NAME", &mut config.name);
        load_env_path("APPENDER_FILE", &mut config.file);
        load_env_var("APPENDER_APPEND", &mut config.append)?;
        load_env_var("APPENDER_BUFFER_CAPACITY", &mut config.buffer_capacity)?;
        load_env_var("APPENDER_BLOCKING", &mut config.blocking)?;
        load_env_var("APPENDER_IMMEDIATE_FLUSH", &mut config.immediate_flush)?;
        load_env_var("APPENDER_BUFFERED_IO", &mut config.buffered_io)?;
        load_env_var("APPENDER_IO_BUFFER_SIZE", &mut config.io_buffer_size)?;
        load_env_var("APPENDER_LAYOUT", &mut config.layout)?;
        load_env_size("APPENDER_MAX_FILE_SIZE", &mut config.max_file_size)?;
        load_env_var_opt("APPENDER_ROTATION_INTERVAL", &mut config.rotation_interval)?;

        // Rolling mode requires special handling
        if let Ok(kind) = std::env::var("APPENDER_ROLLING") {
            config.rolling = match kind.to_lowercase().as_str() {
                "fixed_window" | "fixed" => RollingConfig::default(),
                "timestamp" => RollingConfig::Timestamp {
                    max_total_size: None,
                },
                "none" => RollingConfig::None,
                _ => {
                    return Err(ConfigError::EnvError(format!(
                        "Invalid APPENDER_ROLLING: {kind}. Valid values: fixed_window, timestamp, none"
                    )));
                }
            };
        }
        match &mut config.rolling {
            RollingConfig::FixedWindow {
                file_pattern,
                max_index,
                ..
            } => {
                load_env_var_opt("APPENDER_FILE_PATTERN", file_pattern)?;
                load_env_var("APPENDER_MAX_BACKUPS", max_index)?;
            }
            RollingConfig::Timestamp { max_total_size } => {
                if let Ok(value) = std::env::var("APPENDER_MAX_TOTAL_SIZE") {
                    let size = super::parse_size(&value).map_err(|e| {
                        ConfigError::EnvError(format!("Invalid APPENDER_MAX_TOTAL_SIZE: {e}"))
                    })?;
                    *max_total_size = Some(size);
                }
            }
            RollingConfig::None => {}
        }

        config.validate()?;
        Ok(config)
    }

    /// Pattern of the fixed window, derived from `file` when not configured.
    pub fn window_pattern(&self) -> Option<(String, u32, u32)> {
        match &self.rolling {
            RollingConfig::FixedWindow {
                file_pattern,
                min_index,
                max_index,
            } => {
                let pattern = file_pattern
                    .clone()
                    .unwrap_or_else(|| format!("{}.%i", self.file.display()));
                Some((pattern, *min_index, *max_index))
            }
            _ => None,
        }
    }

    /// Replace the window size, switching to a fixed window if needed.
    pub fn set_max_backups(&mut self, max_backups: u32) {
        match &mut self.rolling {
            RollingConfig::FixedWindow { max_index, .. } => *max_index = max_backups,
            _ => {
                self.rolling = RollingConfig::FixedWindow {
                    file_pattern: None,
                    min_index: DEFAULT_MIN_INDEX,
                    max_index: max_backups.max(DEFAULT_MIN_INDEX),
                };
            }
        }
    }
}
