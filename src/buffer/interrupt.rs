//! Cooperative per-thread interrupt flag.
//!
//! A producer blocked on a full queue gives up (and discards its event) when
//! its thread is interrupted. The flag stays set afterwards so the caller can
//! observe it, mirroring how an interrupted blocking call leaves the interrupt
//! status for the code above it.
//!
//! ```ignore
//! let handle = interrupt::current();      // on the producer thread
//! // ... later, from any thread
//! handle.interrupt();                     // wakes the producer if it is parked
//! ```

use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Something a thread can be parked on and woken from.
pub(crate) trait Unpark: Send + Sync {
    fn unpark(&self);
}

#[derive(Default)]
struct InterruptState {
    flag: AtomicBool,
    parked_on: Mutex<Option<Arc<dyn Unpark>>>,
}

thread_local! {
    static CURRENT: Arc<InterruptState> = Arc::new(InterruptState::default());
}

/// Handle to one thread's interrupt flag; cheap to clone and `Send`.
#[derive(Clone)]
pub struct InterruptHandle {
    state: Arc<InterruptState>,
}

impl std::fmt::Debug for InterruptHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterruptHandle")
            .field("interrupted", &self.is_interrupted())
            .finish()
    }
}

impl InterruptHandle {
    /// Set the flag and wake the thread if it is waiting for queue space.
    pub fn interrupt(&self) {
        self.state.flag.store(true, Ordering::SeqCst);
        // Clone out first: the parked thread takes this lock while holding the queue lock
        let target = self.state.parked_on.lock().clone();
        if let Some(target) = target {
            target.unpark();
        }
    }

    pub fn is_interrupted(&self) -> bool {
        self.state.flag.load(Ordering::SeqCst)
    }

    /// Clear the flag, returning whether it was set.
    pub fn clear(&self) -> bool {
        self.state.flag.swap(false, Ordering::SeqCst)
    }
}

/// Handle for the calling thread.
pub fn current() -> InterruptHandle {
    CURRENT.with(|state| InterruptHandle {
        state: Arc::clone(state),
    })
}

/// Whether the calling thread has been interrupted. Does not clear the flag.
pub fn is_interrupted() -> bool {
    CURRENT.with(|state| state.flag.load(Ordering::SeqCst))
}

/// Clear the calling thread's flag, returning whether it was set.
pub fn clear() -> bool {
    CURRENT.with(|state| state.flag.swap(false, Ordering::SeqCst))
}

/// Registration of the calling thread as parked on `target`; undone on drop.
pub(crate) struct ParkGuard {
    state: Arc<InterruptState>,
}

pub(crate) fn park_on(target: Arc<dyn Unpark>) -> ParkGuard {
    let state = CURRENT.with(Arc::clone);
    *state.parked_on.lock() = Some(target);
    ParkGuard { state }
}

impl Drop for ParkGuard {
    fn drop(&mut self) {
        self.state.parked_on.lock().take();
    }
}
