use super::{AsyncRollingAppender, ErrorHandler};
use crate::app::config::{AppenderConfig, RollingConfig};
use crate::domain::AppenderError;
use crate::render::{Layout, Renderer};
use crate::rotation::{
    CompositeTriggeringPolicy, CoordinatorSettings, FixedWindowRollingStrategy, RolloverStrategy,
    RotationCoordinator, SizeBasedTriggeringPolicy, TimeBasedTriggeringPolicy,
    TimestampRollingStrategy, TriggeringPolicy,
};
use std::path::PathBuf;
use std::sync::Arc;

pub const DEFAULT_BUFFER_CAPACITY: usize = 128;

/// Assembles an [`AsyncRollingAppender`].
///
/// Without a triggering policy the file never rolls over; without a strategy
/// a triggered rollover is a no-op.
pub struct AppenderBuilder {
    name: String,
    file: PathBuf,
    append: bool,
    buffer_capacity: usize,
    blocking: bool,
    renderer: Option<Arc<dyn Renderer>>,
    layout: Layout,
    policy: Option<Box<dyn TriggeringPolicy>>,
    strategy: Option<Box<dyn RolloverStrategy>>,
    settings: CoordinatorSettings,
    error_handler: Option<Arc<dyn ErrorHandler>>,
}

impl AppenderBuilder {
    pub fn new(file: impl Into<PathBuf>) -> Self {
        Self {
            name: "rolling".to_string(),
            file: file.into(),
            append: true,
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            blocking: true,
            renderer: None,
            layout: Layout::default(),
            policy: None,
            strategy: None,
            settings: CoordinatorSettings::default(),
            error_handler: None,
        }
    }

    /// Builder populated from a validated configuration.
    pub fn with_config(config: &AppenderConfig) -> Result<Self, AppenderError> {
        config
            .validate()
            .map_err(|e| AppenderError::Config(e.to_string()))?;

        let size = SizeBasedTriggeringPolicy::new(config.max_file_size);
        let policy: Box<dyn TriggeringPolicy> = match config.rotation_interval {
            Some(interval) => Box::new(
                CompositeTriggeringPolicy::new()
                    .with(size)
                    .with(TimeBasedTriggeringPolicy::new(interval)),
            ),
            None => Box::new(size),
        };

        let strategy: Option<Box<dyn RolloverStrategy>> = match &config.rolling {
            RollingConfig::FixedWindow { .. } => {
                let (pattern, min, max) = config
                    .window_pattern()
                    .ok_or_else(|| AppenderError::Config("missing rolling window".to_string()))?;
                let strategy = FixedWindowRollingStrategy::new(pattern, min, max)
                    .map_err(|e| AppenderError::Config(e.to_string()))?;
                Some(Box::new(strategy))
            }
            RollingConfig::Timestamp { max_total_size } => {
                let mut strategy = TimestampRollingStrategy::new();
                if let Some(quota) = *max_total_size {
                    strategy = strategy.with_retention(quota);
                }
                Some(Box::new(strategy))
            }
            RollingConfig::None => None,
        };

        let mut builder = Self::new(config.file.clone())
            .name(config.name.clone())
            .append(config.append)
            .buffer_capacity(config.buffer_capacity)
            .blocking(config.blocking)
            .layout(config.layout)
            .immediate_flush(config.immediate_flush)
            .buffered_io(config.buffered_io)
            .io_buffer_size(config.io_buffer_size);
        builder.policy = Some(policy);
        builder.strategy = strategy;
        Ok(builder)
    }

    pub fn from_config(config: &AppenderConfig) -> Result<AsyncRollingAppender, AppenderError> {
        Self::with_config(config)?.build()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn append(mut self, append: bool) -> Self {
        self.append = append;
        self
    }

    /// 0 disables the queue: events are written on the producing thread.
    pub fn buffer_capacity(mut self, capacity: usize) -> Self {
        self.buffer_capacity = capacity;
        self
    }

    pub fn blocking(mut self, blocking: bool) -> Self {
        self.blocking = blocking;
        self
    }

    /// Takes precedence over [`layout`](Self::layout).
    pub fn renderer(mut self, renderer: Arc<dyn Renderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    pub fn layout(mut self, layout: Layout) -> Self {
        self.layout = layout;
        self
    }

    pub fn triggering_policy(mut self, policy: impl TriggeringPolicy + 'static) -> Self {
        self.policy = Some(Box::new(policy));
        self
    }

    pub fn rollover_strategy(mut self, strategy: impl RolloverStrategy + 'static) -> Self {
        self.strategy = Some(Box::new(strategy));
        self
    }

    pub fn immediate_flush(mut self, immediate_flush: bool) -> Self {
        self.settings.immediate_flush = immediate_flush;
        self
    }

    pub fn buffered_io(mut self, buffered_io: bool) -> Self {
        self.settings.buffered_io = buffered_io;
        self
    }

    pub fn io_buffer_size(mut self, size: usize) -> Self {
        self.settings.io_buffer_size = size.max(1);
        self
    }

    /// Replaces the default handler, which closes the appender on failure.
    pub fn error_handler(mut self, handler: Arc<dyn ErrorHandler>) -> Self {
        self.error_handler = Some(handler);
        self
    }

    /// Open the active file and start the dispatcher.
    pub fn build(self) -> Result<AsyncRollingAppender, AppenderError> {
        let renderer = self.renderer.unwrap_or_else(|| self.layout.renderer());
        let coordinator = RotationCoordinator::new(
            self.name.clone(),
            self.file,
            self.append,
            renderer,
            self.settings,
        );
        if let Some(policy) = self.policy {
            coordinator.set_triggering_policy(policy);
        }
        if let Some(strategy) = self.strategy {
            coordinator.set_rollover_strategy(strategy);
        }
        coordinator.activate()?;

        Ok(AsyncRollingAppender::start(
            self.name,
            coordinator,
            self.buffer_capacity,
            self.blocking,
            self.error_handler,
        ))
    }
}
