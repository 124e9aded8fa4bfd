use super::action::Action;
use super::policy::TriggeringPolicy;
use super::strategy::{RolloverDescription, RolloverStrategy};
use super::target::{CoordinatorSettings, Target};
use crate::domain::{AppenderError, LogEvent};
use crate::render::Renderer;
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

/// Result of one successful [`RotationCoordinator::write`].
#[derive(Debug)]
pub struct Written {
    pub bytes: usize,
    pub rolled_over: bool,
    /// A rollover was attempted before the write and failed to open its new
    /// target; the event went to the previous target instead.
    pub rollover_error: Option<AppenderError>,
}

/// Asynchronous action of the last rollover and the thread running it.
struct PendingAction {
    action: Arc<dyn Action>,
    runner: Option<JoinHandle<()>>,
}

impl PendingAction {
    fn launch(appender: &str, action: Arc<dyn Action>) -> Self {
        let task = Arc::clone(&action);
        let spawned = thread::Builder::new()
            .name(format!("appender-rollover-{appender}"))
            .spawn(move || run_action(task.as_ref()));

        match spawned {
            Ok(runner) => Self {
                action,
                runner: Some(runner),
            },
            Err(e) => {
                warn!(appender, error = %e, "Could not spawn rollover action thread, running inline");
                run_action(action.as_ref());
                Self {
                    action,
                    runner: None,
                }
            }
        }
    }

    fn signal(&self) {
        self.action.close();
    }

    /// Close the action, which only stops it if it has not started, and wait
    /// for its thread.
    fn finish(mut self) {
        self.action.close();
        if let Some(runner) = self.runner.take()
            && runner.join().is_err()
        {
            warn!("Asynchronous rollover action panicked");
        }
    }
}

fn run_action(action: &dyn Action) {
    match action.execute() {
        Ok(true) => debug!("Asynchronous rollover action completed"),
        Ok(false) => debug!("Asynchronous rollover action did not complete"),
        Err(e) => warn!(error = %e, "Asynchronous rollover action failed"),
    }
}

struct RotationState {
    file: PathBuf,
    append: bool,
    target: Option<Target>,
    bytes_written: u64,
    pending: Option<PendingAction>,
    policy: Option<Box<dyn TriggeringPolicy>>,
    strategy: Option<Box<dyn RolloverStrategy>>,
    rollovers: u64,
    closed: bool,
    warned_closed: bool,
}

/// Owns the active file: byte accounting, trigger consultation and rollover.
///
/// Every write and rollover happens under one mutex, independent of the event
/// queue, so manual [`rollover`](Self::rollover) calls and policy changes from
/// other threads are serialised with the dispatcher's writes.
pub struct RotationCoordinator {
    name: String,
    renderer: Arc<dyn Renderer>,
    settings: CoordinatorSettings,
    state: Mutex<RotationState>,
}

impl RotationCoordinator {
    /// Create an inactive coordinator; [`activate`](Self::activate) opens the file.
    pub fn new(
        name: impl Into<String>,
        file: impl Into<PathBuf>,
        append: bool,
        renderer: Arc<dyn Renderer>,
        settings: CoordinatorSettings,
    ) -> Self {
        Self {
            name: name.into(),
            renderer,
            settings,
            state: Mutex::new(RotationState {
                file: file.into(),
                append,
                target: None,
                bytes_written: 0,
                pending: None,
                policy: None,
                strategy: None,
                rollovers: 0,
                closed: false,
                warned_closed: false,
            }),
        }
    }

    pub fn set_triggering_policy(&self, policy: Box<dyn TriggeringPolicy>) {
        self.state.lock().policy = Some(policy);
    }

    pub fn set_rollover_strategy(&self, strategy: Box<dyn RolloverStrategy>) {
        self.state.lock().strategy = Some(strategy);
    }

    /// Let the strategy choose the initial file, then open it.
    pub fn activate(&self) -> Result<(), AppenderError> {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        if state.strategy.is_none() {
            warn!(appender = %self.name, "No rollover strategy set, file will never roll over");
        } else if state.policy.is_none() {
            warn!(appender = %self.name, "No triggering policy set, only manual rollovers will happen");
        }

        let mut asynchronous = None;
        if let Some(strategy) = state.strategy.as_mut() {
            match strategy.initialize(&state.file, state.append) {
                Ok(Some(description)) => {
                    if let Some(action) = description.synchronous
                        && let Err(e) = action.execute()
                    {
                        warn!(appender = %self.name, error = %e, "Initial rollover action failed");
                    }
                    state.file = description.active_file;
                    state.append = description.append;
                    asynchronous = description.asynchronous;
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(appender = %self.name, error = %e, "Rollover strategy initialization failed, using configured file");
                }
            }
        }

        let (file, append) = (state.file.clone(), state.append);
        self.open_target(state, file, append)?;
        if let Some(action) = asynchronous {
            state.pending = Some(PendingAction::launch(&self.name, action));
        }

        info!(appender = %self.name, path = %state.file.display(), bytes = state.bytes_written, "Log target opened");
        Ok(())
    }

    /// Render and write one event, rolling over first if the policy says so.
    pub fn write(&self, event: &LogEvent) -> Result<Written, AppenderError> {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        if state.closed || state.target.is_none() {
            if !state.warned_closed {
                warn!(appender = %self.name, "Write attempted on a closed log target, dropping events");
                state.warned_closed = true;
            }
            return Err(AppenderError::Closed);
        }

        let triggered = match state.policy.as_mut() {
            Some(policy) => policy.should_rollover(&state.file, state.bytes_written, event),
            None => false,
        };

        let mut rolled_over = false;
        let mut rollover_error = None;
        if triggered {
            match self.rollover_locked(state) {
                Ok(rolled) => rolled_over = rolled,
                Err(e) => rollover_error = Some(e),
            }
        }

        let Some(target) = state.target.as_mut() else {
            return Err(rollover_error.unwrap_or(AppenderError::Closed));
        };

        let rendered = self.renderer.render(event);
        target
            .write_str(&rendered, self.settings.immediate_flush)
            .map_err(|source| AppenderError::Write {
                path: state.file.clone(),
                source,
            })?;
        state.bytes_written += rendered.len() as u64;

        Ok(Written {
            bytes: rendered.len(),
            rolled_over,
            rollover_error,
        })
    }

    /// Roll over now. Returns whether the active file was rotated.
    pub fn rollover(&self) -> Result<bool, AppenderError> {
        let mut guard = self.state.lock();
        if guard.closed {
            return Ok(false);
        }
        self.rollover_locked(&mut guard)
    }

    fn rollover_locked(&self, state: &mut RotationState) -> Result<bool, AppenderError> {
        if let Some(previous) = state.pending.take() {
            previous.finish();
        }

        let Some(strategy) = state.strategy.as_mut() else {
            return Ok(false);
        };

        let description = match strategy.plan_rollover(&state.file, state.append) {
            Ok(Some(description)) => description,
            Ok(None) => return Ok(false),
            Err(e) => {
                let error = AppenderError::RolloverPlanning(e.to_string());
                warn!(appender = %self.name, error = %error, "Rollover deferred");
                return Ok(false);
            }
        };

        let rolled = if description.active_file == state.file {
            self.roll_in_place(state, description)?
        } else {
            self.roll_to_new_file(state, description)?
        };

        if rolled {
            state.rollovers += 1;
            info!(
                appender = %self.name,
                path = %state.file.display(),
                rollovers = state.rollovers,
                "Rolled over log file"
            );
        }
        Ok(rolled)
    }

    /// Same active name: the old file is closed before the synchronous action
    /// moves it away, then the name is reopened.
    fn roll_in_place(&self, state: &mut RotationState, description: RolloverDescription) -> Result<bool, AppenderError> {
        self.close_target(state);

        let completed = match &description.synchronous {
            None => true,
            Some(action) => match action.execute() {
                Ok(completed) => {
                    if !completed {
                        warn!(appender = %self.name, "Post-close rollover action did not complete");
                    }
                    completed
                }
                Err(e) => {
                    warn!(appender = %self.name, error = %e, "Post-close rollover action failed");
                    false
                }
            },
        };

        if !completed {
            // Keep writing to the same file
            self.open_target(state, description.active_file, true)?;
            return Ok(false);
        }

        self.open_target(state, description.active_file, description.append)?;
        if let Some(action) = description.asynchronous {
            state.pending = Some(PendingAction::launch(&self.name, action));
        }
        Ok(true)
    }

    /// New active name: the new file is opened first so a failure leaves the
    /// current target in place.
    fn roll_to_new_file(&self, state: &mut RotationState, description: RolloverDescription) -> Result<bool, AppenderError> {
        let RolloverDescription {
            active_file,
            append,
            synchronous,
            asynchronous,
        } = description;

        let (target, len) = Target::open(&active_file, append, &self.settings).map_err(|source| {
            AppenderError::RolloverIo {
                path: active_file.clone(),
                source,
            }
        })?;

        if let Some(previous) = state.target.replace(target) {
            self.finish_target(previous);
        }
        state.file = active_file;
        state.append = append;
        state.bytes_written = len;

        let completed = match synchronous {
            None => true,
            Some(action) => action.execute().unwrap_or_else(|e| {
                warn!(appender = %self.name, error = %e, "Rollover action failed");
                false
            }),
        };
        if completed && let Some(action) = asynchronous {
            state.pending = Some(PendingAction::launch(&self.name, action));
        }

        self.write_header(state)?;
        Ok(true)
    }

    fn open_target(&self, state: &mut RotationState, path: PathBuf, append: bool) -> Result<(), AppenderError> {
        let (target, len) = Target::open(&path, append, &self.settings)
            .map_err(|source| AppenderError::RolloverIo {
                path: path.clone(),
                source,
            })?;
        state.target = Some(target);
        state.file = path;
        state.append = append;
        state.bytes_written = len;
        self.write_header(state)
    }

    fn write_header(&self, state: &mut RotationState) -> Result<(), AppenderError> {
        let (Some(header), Some(target)) = (self.renderer.header(), state.target.as_mut()) else {
            return Ok(());
        };
        target
            .write_str(&header, self.settings.immediate_flush)
            .map_err(|source| AppenderError::Write {
                path: state.file.clone(),
                source,
            })?;
        state.bytes_written += header.len() as u64;
        Ok(())
    }

    fn close_target(&self, state: &mut RotationState) {
        if let Some(target) = state.target.take() {
            self.finish_target(target);
        }
    }

    fn finish_target(&self, target: Target) {
        let path = target.path().to_path_buf();
        if let Err(e) = target.finish(self.renderer.footer().as_deref()) {
            warn!(appender = %self.name, path = %path.display(), error = %e, "Failed to finish log file");
        }
    }

    pub fn flush(&self) -> Result<(), AppenderError> {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        match state.target.as_mut() {
            Some(target) => target.flush().map_err(|source| AppenderError::Write {
                path: state.file.clone(),
                source,
            }),
            None => Ok(()),
        }
    }

    /// Ask the running asynchronous action, if any, to stop.
    pub fn signal_pending_action(&self) {
        if let Some(pending) = self.state.lock().pending.as_ref() {
            pending.signal();
        }
    }

    /// Write the footer, flush, and wait for the asynchronous action. Idempotent.
    pub fn close(&self) {
        let mut guard = self.state.lock();
        if guard.closed {
            return;
        }
        guard.closed = true;
        self.close_target(&mut guard);
        if let Some(pending) = guard.pending.take() {
            pending.finish();
        }
        debug!(appender = %self.name, "Log target closed");
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Bytes counted toward the active file since it was opened or rolled.
    pub fn bytes_written(&self) -> u64 {
        self.state.lock().bytes_written
    }

    pub fn active_file(&self) -> PathBuf {
        self.state.lock().file.clone()
    }

    pub fn rollovers(&self) -> u64 {
        self.state.lock().rollovers
    }
}

impl Drop for RotationCoordinator {
    fn drop(&mut self) {
        self.close();
    }
}
