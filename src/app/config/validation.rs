use super::{AppenderConfig, ConfigError, RollingConfig};

impl AppenderConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::InvalidConfig(
                "Appender name must not be empty".to_string(),
            ));
        }

        if self.file.as_os_str().is_empty() {
            return Err(ConfigError::InvalidConfig(
                "Log file path must not be empty".to_string(),
            ));
        }

        if self.max_file_size == 0 {
            return Err(ConfigError::InvalidConfig(
                "Max file size must be greater than 0".to_string(),
            ));
        }

        if self.buffered_io && self.io_buffer_size == 0 {
            return Err(ConfigError::InvalidConfig(
                "IO buffer size must be greater than 0 when buffered IO is enabled".to_string(),
            ));
        }

        match &self.rolling {
            RollingConfig::FixedWindow {
                file_pattern,
                min_index,
                max_index,
            } => {
                if min_index > max_index {
                    return Err(ConfigError::InvalidConfig(format!(
                        "Rolling window is inverted: min_index ({min_index}) > max_index ({max_index})"
                    )));
                }
                if let Some(pattern) = file_pattern
                    && !pattern.contains("%i")
                {
                    return Err(ConfigError::InvalidConfig(format!(
                        "File pattern '{pattern}' must contain %i"
                    )));
                }
            }
            RollingConfig::Timestamp {
                max_total_size: Some(0),
            } => {
                return Err(ConfigError::InvalidConfig(
                    "Retention quota must be greater than 0".to_string(),
                ));
            }
            RollingConfig::Timestamp { .. } | RollingConfig::None => {}
        }

        Ok(())
    }
}
