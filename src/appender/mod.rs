//! Producer-facing handle of the asynchronous rolling appender.
//!
//! ```no_run
//! use rolling_appender::appender::AppenderBuilder;
//! use rolling_appender::domain::{LogEvent, LogLevel};
//! use rolling_appender::rotation::{FixedWindowRollingStrategy, SizeBasedTriggeringPolicy};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let appender = AppenderBuilder::new("logs/app.log")
//!     .buffer_capacity(256)
//!     .triggering_policy(SizeBasedTriggeringPolicy::new(10 * 1024 * 1024))
//!     .rollover_strategy(FixedWindowRollingStrategy::numbered("logs/app.log".as_ref(), 5)?)
//!     .build()?;
//!
//! appender.submit(LogEvent::new(LogLevel::Info, "billing", "invoice sent"));
//! appender.close();
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod error_handler;

pub use builder::AppenderBuilder;
pub use error_handler::{CloseOnError, ErrorHandler, LogErrorHandler};

use crate::buffer::{Admission, AppenderMetrics, EventQueue, MetricsSnapshot};
use crate::dispatcher::{self, DispatcherState, DispatcherStatus};
use crate::domain::{AppenderError, LogEvent};
use crate::rotation::{RolloverStrategy, RotationCoordinator, TriggeringPolicy};
use parking_lot::{Mutex, RwLock};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::thread::JoinHandle;
use tracing::{info, warn};

/// State shared between producer handles and the dispatcher thread.
pub(crate) struct Core {
    pub(crate) name: String,
    pub(crate) queue: Arc<EventQueue>,
    pub(crate) coordinator: RotationCoordinator,
    pub(crate) status: DispatcherStatus,
    errors: RwLock<Arc<dyn ErrorHandler>>,
    metrics: Arc<AppenderMetrics>,
}

impl Core {
    /// Write one event through the coordinator and route any failure.
    pub(crate) fn write(&self, event: &LogEvent) {
        match self.coordinator.write(event) {
            Ok(written) => {
                self.metrics.record_written(written.bytes);
                if let Some(error) = written.rollover_error {
                    self.report(&error);
                }
            }
            Err(AppenderError::Closed) => self.metrics.record_dropped_after_close(),
            Err(error) => {
                self.metrics.record_write_error();
                self.report(&error);
            }
        }
    }

    fn report(&self, error: &AppenderError) {
        if error.is_escalated() {
            self.escalate(error);
        } else {
            warn!(appender = %self.name, error = %error, "Log target failure not escalated");
        }
    }

    fn escalate(&self, error: &AppenderError) {
        // Clone out so the handler may replace itself
        let handler = Arc::clone(&*self.errors.read());
        handler.on_error(&self.name, error);
    }
}

pub(crate) struct AppenderInner {
    core: Arc<Core>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
    closed: AtomicBool,
}

impl AppenderInner {
    pub(crate) fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let core = &self.core;

        core.coordinator.signal_pending_action();
        core.queue.close();

        // The dispatcher closing itself (via the error handler) cannot join itself
        if !core.queue.is_dispatcher_thread() {
            let handle = self.dispatcher.lock().take();
            if let Some(handle) = handle
                && handle.join().is_err()
            {
                let error = AppenderError::ShutdownInterrupted("dispatcher thread panicked".to_string());
                warn!(appender = %core.name, error = %error, "Dispatcher did not finish cleanly");
            }
        }

        core.coordinator.close();
        info!(appender = %core.name, "Appender closed");
    }
}

impl Drop for AppenderInner {
    fn drop(&mut self) {
        self.close();
    }
}

/// Cheaply cloneable handle; the appender closes when the last clone drops.
#[derive(Clone)]
pub struct AsyncRollingAppender {
    inner: Arc<AppenderInner>,
}

impl AsyncRollingAppender {
    pub fn builder(file: impl Into<PathBuf>) -> AppenderBuilder {
        AppenderBuilder::new(file)
    }

    /// Start the dispatcher over an already activated coordinator.
    pub(crate) fn start(
        name: String,
        coordinator: RotationCoordinator,
        capacity: usize,
        blocking: bool,
        error_handler: Option<Arc<dyn ErrorHandler>>,
    ) -> Self {
        let metrics = Arc::new(AppenderMetrics::new());
        let queue = Arc::new(EventQueue::new(capacity, blocking, Arc::clone(&metrics)));

        let inner = Arc::new_cyclic(|weak: &Weak<AppenderInner>| {
            let handler = error_handler.unwrap_or_else(|| Arc::new(CloseOnError::from_weak(weak.clone())));
            AppenderInner {
                core: Arc::new(Core {
                    name,
                    queue,
                    coordinator,
                    status: DispatcherStatus::new(),
                    errors: RwLock::new(handler),
                    metrics,
                }),
                dispatcher: Mutex::new(None),
                closed: AtomicBool::new(false),
            }
        });

        match dispatcher::spawn(Arc::clone(&inner.core)) {
            Ok(handle) => *inner.dispatcher.lock() = Some(handle),
            Err(e) => {
                warn!(appender = %inner.core.name, error = %e, "Could not start dispatcher, writing synchronously");
                inner.core.queue.mark_dispatcher_stopped();
                inner.core.status.set(DispatcherState::Stopped);
            }
        }

        Self { inner }
    }

    pub(crate) fn downgrade(&self) -> Weak<AppenderInner> {
        Arc::downgrade(&self.inner)
    }

    fn core(&self) -> &Core {
        &self.inner.core
    }

    /// Hand an event to the appender. Never fails and never panics.
    ///
    /// With a full queue the call blocks in blocking mode until the dispatcher
    /// frees space, unless the calling thread is interrupted
    /// ([`crate::buffer::interrupt`]) or is the dispatcher itself, in which
    /// case the event is summarised and dropped.
    pub fn submit(&self, event: LogEvent) {
        let core = self.core();
        core.metrics.record_submitted();
        match core.queue.offer(event) {
            Admission::Enqueued | Admission::Discarded => {}
            Admission::Bypass(event) => {
                core.metrics.record_bypassed();
                core.write(&event);
            }
        }
    }

    /// Like [`submit`](Self::submit), but reports what happened to the event.
    pub fn try_submit(&self, event: LogEvent) -> Admission {
        let core = self.core();
        core.metrics.record_submitted();
        match core.queue.offer(event) {
            Admission::Bypass(event) => {
                core.metrics.record_bypassed();
                core.write(&event);
                Admission::Bypass(event)
            }
            admission => admission,
        }
    }

    /// Drain everything admitted so far, then close the log file. Idempotent.
    pub fn close(&self) {
        self.inner.close();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Roll the active file over now, serialised with the dispatcher's writes.
    pub fn rollover(&self) -> Result<bool, AppenderError> {
        self.core().coordinator.rollover()
    }

    pub fn name(&self) -> &str {
        &self.core().name
    }

    /// Values below 1 are raised to 1; waiting producers re-evaluate.
    pub fn set_buffer_capacity(&self, capacity: usize) {
        self.core().queue.set_capacity(capacity);
    }

    pub fn buffer_capacity(&self) -> usize {
        self.core().queue.capacity()
    }

    pub fn set_blocking(&self, blocking: bool) {
        self.core().queue.set_blocking(blocking);
    }

    pub fn is_blocking(&self) -> bool {
        self.core().queue.is_blocking()
    }

    pub fn set_triggering_policy(&self, policy: impl TriggeringPolicy + 'static) {
        self.core().coordinator.set_triggering_policy(Box::new(policy));
    }

    pub fn set_rollover_strategy(&self, strategy: impl RolloverStrategy + 'static) {
        self.core().coordinator.set_rollover_strategy(Box::new(strategy));
    }

    pub fn set_error_handler(&self, handler: Arc<dyn ErrorHandler>) {
        *self.core().errors.write() = handler;
    }

    pub fn dispatcher_state(&self) -> DispatcherState {
        self.core().status.get()
    }

    pub fn active_file(&self) -> PathBuf {
        self.core().coordinator.active_file()
    }

    /// Bytes counted toward the active file since it was opened or rolled.
    pub fn bytes_written(&self) -> u64 {
        self.core().coordinator.bytes_written()
    }

    pub fn queue_len(&self) -> usize {
        self.core().queue.len()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        let core = self.core();
        MetricsSnapshot {
            rollovers: core.coordinator.rollovers(),
            queue_len: core.queue.len(),
            capacity: core.queue.capacity(),
            ..core.metrics.snapshot()
        }
    }
}

impl std::fmt::Debug for AsyncRollingAppender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncRollingAppender")
            .field("name", &self.name())
            .field("closed", &self.is_closed())
            .field("dispatcher", &self.dispatcher_state())
            .finish()
    }
}
