//! Per-thread diagnostic context.
//!
//! Values put here are copied into every [`LogEvent`](super::LogEvent) created
//! on the same thread. The copy happens when the event is built, not when the
//! dispatcher writes it, so later changes on the producing thread never leak
//! into events that are already queued.

use std::cell::RefCell;
use std::collections::BTreeMap;

thread_local! {
    static CONTEXT: RefCell<BTreeMap<String, String>> = const { RefCell::new(BTreeMap::new()) };
}

/// Set `key` for the current thread, returning the previous value.
pub fn put(key: impl Into<String>, value: impl Into<String>) -> Option<String> {
    CONTEXT.with(|ctx| ctx.borrow_mut().insert(key.into(), value.into()))
}

pub fn get(key: &str) -> Option<String> {
    CONTEXT.with(|ctx| ctx.borrow().get(key).cloned())
}

pub fn remove(key: &str) -> Option<String> {
    CONTEXT.with(|ctx| ctx.borrow_mut().remove(key))
}

pub fn clear() {
    CONTEXT.with(|ctx| ctx.borrow_mut().clear());
}

/// Copy of the current thread's context.
pub fn snapshot() -> BTreeMap<String, String> {
    CONTEXT.with(|ctx| ctx.borrow().clone())
}

/// RAII guard for a single context entry
///
/// Restores whatever value the key had before the guard was created.
///
/// ```ignore
/// let _request = ContextGuard::new("request_id", "r-42");
/// appender.submit(LogEvent::new(LogLevel::Info, "http", "accepted"));
/// ```
#[must_use = "the context entry is removed when the guard is dropped"]
pub struct ContextGuard {
    key: String,
    previous: Option<String>,
}

impl ContextGuard {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into();
        let previous = put(key.clone(), value);
        Self { key, previous }
    }
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        match self.previous.take() {
            Some(previous) => {
                put(self.key.clone(), previous);
            }
            None => {
                remove(&self.key);
            }
        }
    }
}
