//! Domain layer for rolling-appender.
//!
//! Contains the canonical types shared across all modules:
//! - `LogEvent`: The immutable event travelling from producer to file
//! - `LogLevel`: Ordered severity (Trace..Fatal)
//! - `context`: Per-thread diagnostic context captured into events
//! - `AppenderError`: Top-level error type

pub mod context;
pub mod error;
pub mod log_event;
pub mod log_level;

pub use context::ContextGuard;
pub use error::AppenderError;
pub use log_event::LogEvent;
pub use log_level::{LogLevel, ParseLevelError};
