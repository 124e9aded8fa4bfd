#![deny(rust_2024_compatibility)]
// Specific pedantic lints enforced (not blanket allow):
#![deny(
    clippy::explicit_iter_loop,
    clippy::manual_let_else,
    clippy::semicolon_if_nothing_returned,
    clippy::inconsistent_struct_constructor
)]
// Noisy pedantic lints suppressed with justification:
#![allow(
    clippy::cast_possible_truncation, // Byte counts stay far below usize/u64 limits
    clippy::missing_errors_doc,       // Error enums document their variants
    clippy::missing_panics_doc,       // Internal API
    clippy::module_name_repetitions,  // e.g. RolloverError in rotation module
    clippy::must_use_candidate,       // Annotated selectively on critical APIs
    clippy::doc_markdown              // Internal API
)]

pub mod app;
pub mod appender;
pub mod buffer;
pub mod dispatcher;
pub mod domain;
pub mod render;
pub mod rotation;

// Re-export main types for easy access
pub use appender::{AppenderBuilder, AsyncRollingAppender, CloseOnError, ErrorHandler, LogErrorHandler};
pub use buffer::{Admission, InterruptHandle, MetricsSnapshot};
pub use dispatcher::DispatcherState;
pub use domain::{AppenderError, LogEvent, LogLevel};
pub use render::{JsonRenderer, Layout, PatternRenderer, Renderer};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
