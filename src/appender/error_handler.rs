use super::{AppenderInner, AsyncRollingAppender};
use crate::domain::AppenderError;
use std::sync::Weak;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::error;

/// Receives escalated write and rollover failures.
///
/// Called on whichever thread hit the failure (usually the dispatcher) with no
/// appender lock held, so it may call back into the appender, including
/// [`AsyncRollingAppender::close`].
pub trait ErrorHandler: Send + Sync {
    fn on_error(&self, appender: &str, error: &AppenderError);
}

/// Default handler: log the failure and close the appender.
///
/// Events still queued when the appender closes are dropped and counted in
/// `dropped_after_close`.
pub struct CloseOnError {
    appender: Weak<AppenderInner>,
}

impl CloseOnError {
    pub fn new(appender: &AsyncRollingAppender) -> Self {
        Self {
            appender: appender.downgrade(),
        }
    }

    pub(crate) fn from_weak(appender: Weak<AppenderInner>) -> Self {
        Self { appender }
    }
}

impl ErrorHandler for CloseOnError {
    fn on_error(&self, appender: &str, error: &AppenderError) {
        error!(appender, error = %error, "Unrecoverable log target failure, closing appender");
        if let Some(inner) = self.appender.upgrade() {
            inner.close();
        }
    }
}

/// Logs failures and keeps the appender running.
#[derive(Debug, Default)]
pub struct LogErrorHandler {
    only_once: bool,
    reported: AtomicBool,
}

impl LogErrorHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report only the first failure; later ones are silently ignored.
    pub fn only_once() -> Self {
        Self {
            only_once: true,
            reported: AtomicBool::new(false),
        }
    }

    pub fn has_reported(&self) -> bool {
        self.reported.load(Ordering::Relaxed)
    }
}

impl ErrorHandler for LogErrorHandler {
    fn on_error(&self, appender: &str, error: &AppenderError) {
        let already = self.reported.swap(true, Ordering::Relaxed);
        if self.only_once && already {
            return;
        }
        error!(appender, error = %error, "Log target failure");
    }
}
