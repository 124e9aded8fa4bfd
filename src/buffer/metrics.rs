use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Lock-free counters shared by the queue, the dispatcher and the appender.
#[derive(Debug, Default)]
pub struct AppenderMetrics {
    submitted: AtomicU64,
    enqueued: AtomicU64,
    bypassed: AtomicU64,
    discarded: AtomicU64,
    blocked_waits: AtomicU64,
    drain_cycles: AtomicU64,
    events_written: AtomicU64,
    bytes_written: AtomicU64,
    write_errors: AtomicU64,
    dropped_after_close: AtomicU64,
    peak_queue_len: AtomicUsize,
}

impl AppenderMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_submitted(&self) {
        self.submitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_enqueued(&self, queue_len: usize) {
        self.enqueued.fetch_add(1, Ordering::Relaxed);
        self.peak_queue_len.fetch_max(queue_len, Ordering::Relaxed);
    }

    pub fn record_bypassed(&self) {
        self.bypassed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_discarded(&self) {
        self.discarded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_blocked_wait(&self) {
        self.blocked_waits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_drain_cycle(&self) {
        self.drain_cycles.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_written(&self, bytes: usize) {
        self.events_written.fetch_add(1, Ordering::Relaxed);
        self.bytes_written.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn record_write_error(&self) {
        self.write_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped_after_close(&self) {
        self.dropped_after_close.fetch_add(1, Ordering::Relaxed);
    }

    pub fn blocked_waits(&self) -> u64 {
        self.blocked_waits.load(Ordering::Relaxed)
    }

    /// Counters only; queue length, capacity and rollovers are filled in by the appender.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            submitted: self.submitted.load(Ordering::Relaxed),
            enqueued: self.enqueued.load(Ordering::Relaxed),
            bypassed: self.bypassed.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
            blocked_waits: self.blocked_waits.load(Ordering::Relaxed),
            drain_cycles: self.drain_cycles.load(Ordering::Relaxed),
            events_written: self.events_written.load(Ordering::Relaxed),
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
            write_errors: self.write_errors.load(Ordering::Relaxed),
            dropped_after_close: self.dropped_after_close.load(Ordering::Relaxed),
            peak_queue_len: self.peak_queue_len.load(Ordering::Relaxed),
            ..MetricsSnapshot::default()
        }
    }
}

/// Point-in-time view of the appender counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub submitted: u64,
    pub enqueued: u64,
    pub bypassed: u64,
    pub discarded: u64,
    pub blocked_waits: u64,
    pub drain_cycles: u64,
    pub events_written: u64,
    pub bytes_written: u64,
    pub write_errors: u64,
    pub dropped_after_close: u64,
    pub rollovers: u64,
    pub peak_queue_len: usize,
    pub queue_len: usize,
    pub capacity: usize,
}
