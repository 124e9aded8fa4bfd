use serde::{Deserialize, Serialize};

pub const DEFAULT_MIN_INDEX: u32 = 1;
pub const DEFAULT_MAX_INDEX: u32 = 7;

/// How rotated files are named and kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RollingConfig {
    /// `app.log` stays active; rotated files go through a numbered window.
    FixedWindow {
        /// Defaults to `{file}.%i`; a `.gz` suffix enables compression.
        #[serde(default)]
        file_pattern: Option<String>,
        #[serde(default = "default_min_index")]
        min_index: u32,
        #[serde(default = "default_max_index")]
        max_index: u32,
    },
    /// Each rollover starts a new timestamped file.
    Timestamp {
        #[serde(default, with = "super::serde_helpers::opt_byte_size")]
        max_total_size: Option<u64>,
    },
    /// Never roll over.
    None,
}

impl Default for RollingConfig {
    fn default() -> Self {
        RollingConfig::FixedWindow {
            file_pattern: None,
            min_index: DEFAULT_MIN_INDEX,
            max_index: DEFAULT_MAX_INDEX,
        }
    }
}

fn default_min_index() -> u32 {
    DEFAULT_MIN_INDEX
}

fn default_max_index() -> u32 {
    DEFAULT_MAX_INDEX
}
