//! Rotation of the active log file.
//!
//! - **coordinator**: `RotationCoordinator`, byte accounting and the rollover algorithm
//! - **policy**: When to roll (`TriggeringPolicy` and the size/time implementations)
//! - **strategy**: How to roll (`RolloverStrategy`, fixed window and timestamped files)
//! - **action**: File operations a rollover schedules (rename, delete, gzip, retention)

pub mod action;
pub mod coordinator;
pub mod policy;
pub mod strategy;
mod target;

pub use action::{
    Action, CompositeAction, FileDeleteAction, FileRenameAction, GzCompressAction,
    RetentionCleanupAction,
};
pub use coordinator::{RotationCoordinator, Written};
pub use policy::{
    CompositeTriggeringPolicy, RotationInterval, SizeBasedTriggeringPolicy,
    TimeBasedTriggeringPolicy, TriggeringPolicy,
};
pub use strategy::{
    FixedWindowRollingStrategy, RolloverDescription, RolloverError, RolloverStrategy,
    TimestampRollingStrategy,
};
pub use target::CoordinatorSettings;
