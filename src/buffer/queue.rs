use super::discard::{DiscardLedger, DiscardSummary};
use super::interrupt::{self, ParkGuard, Unpark};
use super::metrics::AppenderMetrics;
use crate::domain::LogEvent;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::Arc;
use std::thread::{self, ThreadId};

/// Outcome of offering an event to the queue.
#[derive(Debug)]
pub enum Admission {
    /// Queued for the dispatcher.
    Enqueued,
    /// Folded into its source's discard summary.
    Discarded,
    /// No dispatcher is accepting events; the caller must write it synchronously.
    Bypass(LogEvent),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DispatcherSlot {
    /// Spawned but not yet registered; events are accepted and wait for it.
    Starting,
    Running(ThreadId),
    Stopped,
}

impl DispatcherSlot {
    fn accepts_events(self) -> bool {
        !matches!(self, DispatcherSlot::Stopped)
    }

    fn is(self, id: ThreadId) -> bool {
        self == DispatcherSlot::Running(id)
    }
}

struct QueueState {
    events: VecDeque<LogEvent>,
    discards: DiscardLedger,
    capacity: usize,
    blocking: bool,
    closing: bool,
    dispatcher: DispatcherSlot,
}

/// Bounded FIFO of pending events plus the per-source discard ledger.
///
/// One mutex and one condition variable are the only synchronisation between
/// producers and the dispatcher. The condition is signalled when the queue
/// gains its first event, when a drain frees space, and on every
/// configuration change or close.
pub struct EventQueue {
    state: Mutex<QueueState>,
    changed: Condvar,
    metrics: Arc<AppenderMetrics>,
}

impl EventQueue {
    /// A capacity of 0 puts the queue in bypass mode: every offer returns
    /// [`Admission::Bypass`].
    pub fn new(capacity: usize, blocking: bool, metrics: Arc<AppenderMetrics>) -> Self {
        Self {
            state: Mutex::new(QueueState {
                events: VecDeque::with_capacity(capacity.min(4096)),
                discards: DiscardLedger::default(),
                capacity,
                blocking,
                closing: false,
                dispatcher: DispatcherSlot::Starting,
            }),
            changed: Condvar::new(),
            metrics,
        }
    }

    /// Admit an event, blocking for space in blocking mode.
    ///
    /// The calling thread never blocks when it is the dispatcher itself or has
    /// been interrupted; the event is discarded instead.
    pub fn offer(self: &Arc<Self>, event: LogEvent) -> Admission {
        let current = thread::current().id();
        let mut parked: Option<ParkGuard> = None;
        let mut state = self.state.lock();

        loop {
            if !state.dispatcher.accepts_events() {
                return Admission::Bypass(event);
            }
            if state.capacity == 0 {
                // The dispatcher only submits from inside a write; writing through would re-enter it
                if state.dispatcher.is(current) {
                    state.discards.record(event);
                    self.metrics.record_discarded();
                    self.changed.notify_all();
                    return Admission::Discarded;
                }
                return Admission::Bypass(event);
            }

            let len = state.events.len();
            if len < state.capacity {
                state.events.push_back(event);
                self.metrics.record_enqueued(len + 1);
                if len == 0 {
                    self.changed.notify_all();
                }
                return Admission::Enqueued;
            }

            // Register before reading the flag so an interrupt cannot slip in between
            if parked.is_none() {
                let target: Arc<dyn Unpark> = self.clone();
                parked = Some(interrupt::park_on(target));
            }

            let must_discard =
                !state.blocking || interrupt::is_interrupted() || state.dispatcher.is(current);
            if must_discard {
                state.discards.record(event);
                self.metrics.record_discarded();
                return Admission::Discarded;
            }

            self.metrics.record_blocked_wait();
            self.changed.wait(&mut state);

            if interrupt::is_interrupted() {
                state.discards.record(event);
                self.metrics.record_discarded();
                return Admission::Discarded;
            }
        }
    }

    /// Wait for work and take all of it: genuine events in admission order,
    /// then one synthetic event per discard summary.
    ///
    /// Returns `None` once the queue is closing and empty. The dispatcher is
    /// marked stopped in the same critical section, so later offers bypass.
    pub fn next_batch(&self) -> Option<Vec<LogEvent>> {
        let mut state = self.state.lock();

        while state.events.is_empty() && state.discards.is_empty() {
            if state.closing {
                state.dispatcher = DispatcherSlot::Stopped;
                self.changed.notify_all();
                return None;
            }
            self.changed.wait(&mut state);
        }

        Some(self.drain_locked(&mut state))
    }

    /// Take whatever is queued without waiting. Once nothing is left the
    /// dispatcher is marked stopped in the same critical section and `None`
    /// is returned, so producers switch to the bypass path only after every
    /// admitted event has been handed out.
    pub fn take_remaining(&self) -> Option<Vec<LogEvent>> {
        let mut state = self.state.lock();
        if state.events.is_empty() && state.discards.is_empty() {
            state.dispatcher = DispatcherSlot::Stopped;
            self.changed.notify_all();
            return None;
        }
        Some(self.drain_locked(&mut state))
    }

    fn drain_locked(&self, state: &mut QueueState) -> Vec<LogEvent> {
        let summaries = state.discards.drain();
        let mut batch = Vec::with_capacity(state.events.len() + summaries.len());
        batch.extend(state.events.drain(..));
        batch.extend(summaries.into_iter().map(DiscardSummary::into_event));

        // Space is free again
        self.changed.notify_all();
        self.metrics.record_drain_cycle();
        batch
    }

    /// Called by the dispatcher thread once it is running.
    pub fn register_dispatcher(&self, id: ThreadId) {
        let mut state = self.state.lock();
        if state.dispatcher.accepts_events() {
            state.dispatcher = DispatcherSlot::Running(id);
        }
    }

    /// Used when the dispatcher could not be started at all.
    pub fn mark_dispatcher_stopped(&self) {
        self.state.lock().dispatcher = DispatcherSlot::Stopped;
        self.changed.notify_all();
    }

    pub fn is_dispatcher_running(&self) -> bool {
        self.state.lock().dispatcher.accepts_events()
    }

    pub fn is_dispatcher_thread(&self) -> bool {
        self.state.lock().dispatcher.is(thread::current().id())
    }

    /// Mark the queue closing and wake the dispatcher and any blocked producer.
    pub fn close(&self) {
        self.state.lock().closing = true;
        self.changed.notify_all();
    }

    pub fn is_closing(&self) -> bool {
        self.state.lock().closing
    }

    /// Values below 1 are clamped to 1 so the queue cannot starve producers.
    pub fn set_capacity(&self, capacity: usize) {
        self.state.lock().capacity = capacity.max(1);
        self.changed.notify_all();
    }

    pub fn capacity(&self) -> usize {
        self.state.lock().capacity
    }

    pub fn set_blocking(&self, blocking: bool) {
        self.state.lock().blocking = blocking;
        self.changed.notify_all();
    }

    pub fn is_blocking(&self) -> bool {
        self.state.lock().blocking
    }

    pub fn len(&self) -> usize {
        self.state.lock().events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of sources with a live discard summary.
    pub fn discarded_sources(&self) -> usize {
        self.state.lock().discards.len()
    }
}

impl Unpark for EventQueue {
    fn unpark(&self) {
        // Taking the lock orders this notify after the waiter has released it
        let _state = self.state.lock();
        self.changed.notify_all();
    }
}
