//! Bounded event queue shared by producers and the dispatcher.
//!
//! - **queue**: `EventQueue`, the admission algorithm and the drain step
//! - **discard**: Per-source summaries of events dropped by backpressure
//! - **interrupt**: Cooperative per-thread interrupt flag for blocked producers
//! - **metrics**: Lock-free counters and their snapshot

pub mod discard;
pub mod interrupt;
pub mod metrics;
pub mod queue;

pub use discard::{DiscardLedger, DiscardSummary};
pub use interrupt::InterruptHandle;
pub use metrics::{AppenderMetrics, MetricsSnapshot};
pub use queue::{Admission, EventQueue};
