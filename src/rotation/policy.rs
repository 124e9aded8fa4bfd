use crate::domain::LogEvent;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

#[cfg(test)]
use mockall::automock;

pub const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Decides, before each write, whether the active file should roll over.
#[cfg_attr(test, automock)]
pub trait TriggeringPolicy: Send {
    fn should_rollover(&mut self, active_file: &Path, bytes_written: u64, event: &LogEvent) -> bool;
}

/// Fires once the active file has reached `max_file_size` bytes.
#[derive(Debug, Clone)]
pub struct SizeBasedTriggeringPolicy {
    max_file_size: u64,
}

impl SizeBasedTriggeringPolicy {
    pub fn new(max_file_size: u64) -> Self {
        Self { max_file_size }
    }

    pub fn max_file_size(&self) -> u64 {
        self.max_file_size
    }
}

impl Default for SizeBasedTriggeringPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FILE_SIZE)
    }
}

impl TriggeringPolicy for SizeBasedTriggeringPolicy {
    fn should_rollover(&mut self, _active_file: &Path, bytes_written: u64, _event: &LogEvent) -> bool {
        bytes_written >= self.max_file_size
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RotationInterval {
    Minute,
    Hour,
    Day,
}

impl RotationInterval {
    fn seconds(self) -> i64 {
        match self {
            RotationInterval::Minute => 60,
            RotationInterval::Hour => 3_600,
            RotationInterval::Day => 86_400,
        }
    }

    /// Index of the UTC period containing `at`.
    pub fn bucket(self, at: DateTime<Utc>) -> i64 {
        at.timestamp().div_euclid(self.seconds())
    }
}

impl fmt::Display for RotationInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RotationInterval::Minute => "minute",
            RotationInterval::Hour => "hour",
            RotationInterval::Day => "day",
        };
        f.write_str(name)
    }
}

impl FromStr for RotationInterval {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "minute" | "minutely" => Ok(RotationInterval::Minute),
            "hour" | "hourly" => Ok(RotationInterval::Hour),
            "day" | "daily" => Ok(RotationInterval::Day),
            other => Err(format!("unknown rotation interval '{other}'")),
        }
    }
}

/// Fires when an event falls in a later period than the active file.
///
/// The first consultation seeds the current period from the active file's
/// modification time, so a file left over from yesterday rolls on the first
/// event of today.
#[derive(Debug, Clone)]
pub struct TimeBasedTriggeringPolicy {
    interval: RotationInterval,
    current: Option<i64>,
}

impl TimeBasedTriggeringPolicy {
    pub fn new(interval: RotationInterval) -> Self {
        Self {
            interval,
            current: None,
        }
    }

    fn seed(&self, active_file: &Path, event: &LogEvent) -> i64 {
        fs::metadata(active_file)
            .and_then(|metadata| metadata.modified())
            .map(|modified| self.interval.bucket(DateTime::<Utc>::from(modified)))
            .unwrap_or_else(|_| self.interval.bucket(event.timestamp()))
    }
}

impl TriggeringPolicy for TimeBasedTriggeringPolicy {
    fn should_rollover(&mut self, active_file: &Path, bytes_written: u64, event: &LogEvent) -> bool {
        let bucket = self.interval.bucket(event.timestamp());
        let current = match self.current {
            Some(current) => current,
            None => self.seed(active_file, event),
        };

        if bucket > current {
            self.current = Some(bucket);
            // Nothing to roll away from
            bytes_written > 0
        } else {
            self.current = Some(current);
            false
        }
    }
}

/// Fires when any member fires. Every member is consulted so stateful
/// policies stay in step.
#[derive(Default)]
pub struct CompositeTriggeringPolicy {
    policies: Vec<Box<dyn TriggeringPolicy>>,
}

impl CompositeTriggeringPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, policy: impl TriggeringPolicy + 'static) -> Self {
        self.policies.push(Box::new(policy));
        self
    }

    pub fn len(&self) -> usize {
        self.policies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }
}

impl TriggeringPolicy for CompositeTriggeringPolicy {
    fn should_rollover(&mut self, active_file: &Path, bytes_written: u64, event: &LogEvent) -> bool {
        self.policies.iter_mut().fold(false, |fired, policy| {
            policy.should_rollover(active_file, bytes_written, event) || fired
        })
    }
}
