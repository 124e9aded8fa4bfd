//! The single background thread that replays queued events to the log target.

use crate::appender::Core;
use std::fmt;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::thread::{self, JoinHandle};
use tracing::{debug, error, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatcherState {
    /// Waiting for events or for the queue to close.
    Idle,
    /// Writing a drained batch.
    Draining,
    /// Exited; producers write synchronously.
    Stopped,
}

impl fmt::Display for DispatcherState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DispatcherState::Idle => "idle",
            DispatcherState::Draining => "draining",
            DispatcherState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Lock-free view of the dispatcher's state for observers.
#[derive(Debug)]
pub struct DispatcherStatus(AtomicU8);

impl DispatcherStatus {
    pub fn new() -> Self {
        Self(AtomicU8::new(DispatcherState::Idle as u8))
    }

    pub fn get(&self) -> DispatcherState {
        match self.0.load(Ordering::Acquire) {
            0 => DispatcherState::Idle,
            1 => DispatcherState::Draining,
            _ => DispatcherState::Stopped,
        }
    }

    pub fn set(&self, state: DispatcherState) {
        self.0.store(state as u8, Ordering::Release);
    }
}

impl Default for DispatcherStatus {
    fn default() -> Self {
        Self::new()
    }
}

/// Marks the dispatcher stopped even when the thread unwinds, so producers
/// stop waiting on a queue nobody drains. Queued events are salvaged by
/// [`run`] before the guard drops.
struct StopGuard<'a>(&'a Core);

impl Drop for StopGuard<'_> {
    fn drop(&mut self) {
        self.0.queue.mark_dispatcher_stopped();
        self.0.status.set(DispatcherState::Stopped);
    }
}

pub(crate) fn spawn(core: Arc<Core>) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name(format!("appender-dispatcher-{}", core.name))
        .spawn(move || run(&core))
}

fn run(core: &Core) {
    let _stop = StopGuard(core);
    core.queue.register_dispatcher(thread::current().id());
    debug!(appender = %core.name, "Dispatcher started");

    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| dispatch(core))) {
        error!(appender = %core.name, "Dispatcher panicked, writing queued events synchronously");
        salvage(core);
        // Surfaces as ShutdownInterrupted when the appender joins this thread
        panic::resume_unwind(payload);
    }

    debug!(appender = %core.name, "Dispatcher stopped");
}

fn dispatch(core: &Core) {
    while let Some(batch) = core.queue.next_batch() {
        core.status.set(DispatcherState::Draining);
        for event in &batch {
            core.write(event);
        }
        core.status.set(DispatcherState::Idle);
    }
}

/// Write out everything still admitted after a panic, in order, until the
/// queue is empty and marked stopped. Events whose write panics again are
/// dropped.
fn salvage(core: &Core) {
    core.status.set(DispatcherState::Draining);
    let mut written = 0usize;
    let mut dropped = 0usize;

    while let Some(batch) = core.queue.take_remaining() {
        for event in &batch {
            match panic::catch_unwind(AssertUnwindSafe(|| core.write(event))) {
                Ok(()) => written += 1,
                Err(_) => dropped += 1,
            }
        }
    }

    if dropped > 0 {
        warn!(appender = %core.name, written, dropped, "Events dropped after dispatcher panic");
    } else {
        warn!(appender = %core.name, written, "Queued events written after dispatcher panic");
    }
}
