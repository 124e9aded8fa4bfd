//! Turning events into the bytes written to the active file.

pub mod json;
pub mod pattern;

pub use json::JsonRenderer;
pub use pattern::PatternRenderer;

use crate::domain::LogEvent;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Formats one event. Implementations include the line terminator.
pub trait Renderer: Send + Sync {
    fn render(&self, event: &LogEvent) -> String;

    /// Written whenever a target is opened.
    fn header(&self) -> Option<String> {
        None
    }

    /// Written before a target is closed.
    fn footer(&self) -> Option<String> {
        None
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layout {
    #[default]
    Pattern,
    Json,
}

impl Layout {
    pub fn renderer(self) -> Arc<dyn Renderer> {
        match self {
            Layout::Pattern => Arc::new(PatternRenderer::default()),
            Layout::Json => Arc::new(JsonRenderer),
        }
    }
}

impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Layout::Pattern => f.write_str("pattern"),
            Layout::Json => f.write_str("json"),
        }
    }
}

impl FromStr for Layout {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pattern" | "text" => Ok(Layout::Pattern),
            "json" => Ok(Layout::Json),
            other => Err(format!("unknown layout '{other}' (expected pattern or json)")),
        }
    }
}
