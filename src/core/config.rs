//! Pipeline configuration
//!
//! A [`LoggerConfig`] is assembled once with [`LoggerConfigBuilder`] and
//! then handed to [`LoggerEngine::new`](super::engine::LoggerEngine::new),
//! which validates it and owns it for the engine's lifetime. There is no
//! live reconfiguration.

use super::{
    diagnostics::{stderr_handler, DiagnosticHandler},
    error::{LoggerError, Result},
    formatter::{LogFilter, LogFormatter},
    log_level::LogLevel,
    overflow_policy::OverflowPolicy,
    writer::LogWriter,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Default shutdown timeout for draining the background queue (5 seconds)
///
/// Used when the engine is dropped without an explicit `shutdown()`.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Sizing and timing of the background queue
///
/// # Example
///
/// ```
/// use logflow::QueueConfig;
/// use std::time::Duration;
///
/// let queue = QueueConfig::new()
///     .with_capacity(3)
///     .with_batch_size(2)
///     .with_flush_interval(Duration::from_millis(50));
/// assert_eq!(queue.capacity, 3);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Maximum number of buffered events
    pub capacity: usize,
    /// Maximum number of events handed to the dispatcher at once
    pub batch_size: usize,
    /// Longest the consumer idles before checking the buffer again
    pub flush_interval: Duration,
    /// How long disposal waits for the final drain
    pub shutdown_timeout: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: 1000,
            batch_size: 10,
            flush_interval: Duration::from_millis(100),
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }
}

impl QueueConfig {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use = "builder methods return a new value"]
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn with_flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = interval;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Parse from JSON; missing keys keep their defaults
    ///
    /// Durations use serde's `{"secs": .., "nanos": ..}` form.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the consumer loop cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(LoggerError::config(
                "BackgroundQueue",
                "capacity must be greater than zero",
            ));
        }
        if self.batch_size == 0 {
            return Err(LoggerError::config(
                "BackgroundQueue",
                "batch size must be greater than zero",
            ));
        }
        if self.flush_interval.is_zero() {
            return Err(LoggerError::config(
                "BackgroundQueue",
                "flush interval must be greater than zero",
            ));
        }
        Ok(())
    }
}

/// Immutable engine configuration
pub struct LoggerConfig {
    pub(crate) writers: Vec<Arc<dyn LogWriter>>,
    pub(crate) min_level: LogLevel,
    pub(crate) filter: Option<Arc<dyn LogFilter>>,
    pub(crate) formatter: Option<Arc<dyn LogFormatter>>,
    pub(crate) queue: Option<QueueConfig>,
    pub(crate) overflow_policy: OverflowPolicy,
    pub(crate) diagnostics: DiagnosticHandler,
}

impl LoggerConfig {
    /// Create a builder for LoggerConfig
    ///
    /// # Example
    /// ```
    /// use logflow::prelude::*;
    ///
    /// let config = LoggerConfig::builder()
    ///     .min_level(LogLevel::Debug)
    ///     .background_queue(QueueConfig::default())
    ///     .build();
    /// assert!(config.queue().is_some());
    /// ```
    #[must_use]
    pub fn builder() -> LoggerConfigBuilder {
        LoggerConfigBuilder::new()
    }

    pub fn writer_count(&self) -> usize {
        self.writers.len()
    }

    pub fn min_level(&self) -> LogLevel {
        self.min_level
    }

    pub fn has_filter(&self) -> bool {
        self.filter.is_some()
    }

    pub fn has_formatter(&self) -> bool {
        self.formatter.is_some()
    }

    pub fn queue(&self) -> Option<&QueueConfig> {
        self.queue.as_ref()
    }

    pub fn overflow_policy(&self) -> OverflowPolicy {
        self.overflow_policy
    }

    /// Check the configuration before an engine is built from it
    pub fn validate(&self) -> Result<()> {
        match &self.queue {
            Some(queue) => queue.validate(),
            None => Ok(()),
        }
    }
}

impl Default for LoggerConfig {
    fn default() -> Self {
        LoggerConfigBuilder::new().build()
    }
}

impl std::fmt::Debug for LoggerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoggerConfig")
            .field(
                "writers",
                &self.writers.iter().map(|w| w.name()).collect::<Vec<_>>(),
            )
            .field("min_level", &self.min_level)
            .field("filter", &self.filter.is_some())
            .field("formatter", &self.formatter.is_some())
            .field("queue", &self.queue)
            .field("overflow_policy", &self.overflow_policy)
            .finish()
    }
}

/// Builder for constructing a [`LoggerConfig`] with a fluent API
///
/// # Example
/// ```
/// use logflow::prelude::*;
/// use std::time::Duration;
///
/// let engine = LoggerEngine::new(
///     LoggerConfig::builder()
///         .min_level(LogLevel::Debug)
///         .writer(ConsoleWriter::new())
///         .background_queue(QueueConfig::new().with_flush_interval(Duration::from_millis(20)))
///         .overflow_policy(OverflowPolicy::DropNewest)
///         .build(),
/// )
/// .unwrap();
/// engine.info("ready");
/// ```
pub struct LoggerConfigBuilder {
    writers: Vec<Arc<dyn LogWriter>>,
    min_level: LogLevel,
    filter: Option<Arc<dyn LogFilter>>,
    formatter: Option<Arc<dyn LogFormatter>>,
    queue: Option<QueueConfig>,
    overflow_policy: OverflowPolicy,
    diagnostics: Option<DiagnosticHandler>,
}

impl LoggerConfigBuilder {
    /// Create a new builder with default values
    pub fn new() -> Self {
        Self {
            writers: Vec::new(),
            min_level: LogLevel::Info,
            filter: None,
            formatter: None,
            queue: None,
            overflow_policy: OverflowPolicy::default(),
            diagnostics: None,
        }
    }

    /// Append a writer; delivery follows insertion order
    #[must_use = "builder methods return a new value"]
    pub fn writer<W: LogWriter + 'static>(mut self, writer: W) -> Self {
        self.writers.push(Arc::new(writer));
        self
    }

    /// Append a writer that is also held elsewhere
    #[must_use = "builder methods return a new value"]
    pub fn shared_writer(mut self, writer: Arc<dyn LogWriter>) -> Self {
        self.writers.push(writer);
        self
    }

    /// Set minimum log level
    #[must_use = "builder methods return a new value"]
    pub fn min_level(mut self, level: LogLevel) -> Self {
        self.min_level = level;
        self
    }

    /// Set the filter consulted after the level check
    #[must_use = "builder methods return a new value"]
    pub fn filter<F: LogFilter + 'static>(mut self, filter: F) -> Self {
        self.filter = Some(Arc::new(filter));
        self
    }

    /// Set the formatter applied to every delivered event
    #[must_use = "builder methods return a new value"]
    pub fn formatter<F: LogFormatter + 'static>(mut self, formatter: F) -> Self {
        self.formatter = Some(Arc::new(formatter));
        self
    }

    /// Route events through a background queue
    ///
    /// If not called, every log call delivers to the writers directly.
    #[must_use = "builder methods return a new value"]
    pub fn background_queue(mut self, queue: QueueConfig) -> Self {
        self.queue = Some(queue);
        self
    }

    /// Set what happens when the background buffer is full.
    /// Default is `Block`.
    #[must_use = "builder methods return a new value"]
    pub fn overflow_policy(mut self, policy: OverflowPolicy) -> Self {
        self.overflow_policy = policy;
        self
    }

    /// Set the diagnostic handler; defaults to stderr
    #[must_use = "builder methods return a new value"]
    pub fn diagnostics(mut self, handler: DiagnosticHandler) -> Self {
        self.diagnostics = Some(handler);
        self
    }

    /// Build the LoggerConfig
    pub fn build(self) -> LoggerConfig {
        LoggerConfig {
            writers: self.writers,
            min_level: self.min_level,
            filter: self.filter,
            formatter: self.formatter,
            queue: self.queue,
            overflow_policy: self.overflow_policy,
            diagnostics: self.diagnostics.unwrap_or_else(stderr_handler),
        }
    }
}

impl Default for LoggerConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
