//! The logging engine
//!
//! Every log call goes through the same steps: build an event stamped now
//! with the current context, gate it on level and filter, apply the
//! formatter, then hand it to the background queue or straight to the
//! dispatcher. Nothing that fails along the way is returned to the caller;
//! failures are reported through the configured diagnostics handler.

use super::{
    background_queue::BackgroundQueue,
    config::LoggerConfig,
    context::{self, ScopeGuard},
    diagnostics::{panic_message, Diagnostic, DiagnosticHandler},
    dispatcher::Dispatcher,
    error::Result,
    formatter::{LogFilter, LogFormatter},
    log_context::FieldValue,
    log_event::{ErrorInfo, LogEvent},
    log_level::LogLevel,
    metrics::LoggerMetrics,
    overflow_policy::OverflowPolicy,
};
use std::error::Error as StdError;
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

pub struct LoggerEngine {
    min_level: LogLevel,
    filter: Option<Arc<dyn LogFilter>>,
    formatter: Option<Arc<dyn LogFormatter>>,
    overflow_policy: OverflowPolicy,
    dispatcher: Arc<Dispatcher>,
    queue: Option<BackgroundQueue>,
    metrics: Arc<LoggerMetrics>,
    diagnostics: DiagnosticHandler,
}

impl LoggerEngine {
    /// Build an engine from `config`, starting the background consumer if
    /// a queue is configured.
    ///
    /// # Errors
    ///
    /// [`LoggerError::InvalidConfiguration`](super::LoggerError::InvalidConfiguration)
    /// if the queue settings are unusable, or
    /// [`LoggerError::ConsumerStart`](super::LoggerError::ConsumerStart) if the
    /// consumer thread cannot be started.
    pub fn new(config: LoggerConfig) -> Result<Self> {
        config.validate()?;

        let metrics = Arc::new(LoggerMetrics::new());
        let dispatcher = Arc::new(Dispatcher::new(
            config.writers,
            Arc::clone(&config.diagnostics),
            Arc::clone(&metrics),
        ));
        let queue = match &config.queue {
            Some(queue_config) => Some(BackgroundQueue::new(Arc::clone(&dispatcher), queue_config)?),
            None => None,
        };

        Ok(Self {
            min_level: config.min_level,
            filter: config.filter,
            formatter: config.formatter,
            overflow_policy: config.overflow_policy,
            dispatcher,
            queue,
            metrics,
            diagnostics: config.diagnostics,
        })
    }

    pub fn min_level(&self) -> LogLevel {
        self.min_level
    }

    pub fn is_queued(&self) -> bool {
        self.queue.is_some()
    }

    pub fn writer_count(&self) -> usize {
        self.dispatcher.writer_count()
    }

    /// Whether `event` passes the level threshold and the filter
    ///
    /// A panicking filter counts as a rejection.
    pub fn should_log(&self, event: &LogEvent) -> bool {
        if event.level() < self.min_level {
            return false;
        }
        let Some(filter) = &self.filter else {
            return true;
        };
        match catch_unwind(AssertUnwindSafe(|| filter.should_log(event))) {
            Ok(keep) => keep,
            Err(panic_info) => {
                self.report(&Diagnostic::FilterPanicked {
                    panic: panic_message(panic_info.as_ref()),
                });
                false
            }
        }
    }

    pub fn log(&self, level: LogLevel, message: impl Into<String>) {
        self.submit(self.build_event(level, message.into(), None));
    }

    pub async fn log_async(&self, level: LogLevel, message: impl Into<String>) {
        self.submit_async(self.build_event(level, message.into(), None))
            .await;
    }

    /// Log `error` and its source chain at `Error` level
    pub fn log_error<E>(&self, error: &E, message: impl Into<String>)
    where
        E: StdError + ?Sized,
    {
        self.log_error_at(LogLevel::Error, error, message);
    }

    pub fn log_error_at<E>(&self, level: LogLevel, error: &E, message: impl Into<String>)
    where
        E: StdError + ?Sized,
    {
        let error = ErrorInfo::from_error(error);
        self.submit(self.build_event(level, message.into(), Some(error)));
    }

    pub fn log_error_async<E>(
        &self,
        error: &E,
        message: impl Into<String>,
    ) -> impl Future<Output = ()> + '_
    where
        E: StdError + ?Sized,
    {
        self.log_error_at_async(LogLevel::Error, error, message)
    }

    /// The error is rendered before the returned future is created, so the
    /// future borrows neither `error` nor `message`.
    pub fn log_error_at_async<E>(
        &self,
        level: LogLevel,
        error: &E,
        message: impl Into<String>,
    ) -> impl Future<Output = ()> + '_
    where
        E: StdError + ?Sized,
    {
        let event = self.build_event(level, message.into(), Some(ErrorInfo::from_error(error)));
        self.submit_async(event)
    }

    /// Run an already built event through the gate, formatter and routing
    pub fn submit(&self, event: LogEvent) {
        let Some(event) = self.prepare(event) else {
            return;
        };
        match &self.queue {
            Some(queue) => {
                queue.enqueue(event, self.overflow_policy);
            }
            None => self.dispatcher.dispatch(&event),
        }
    }

    pub async fn submit_async(&self, event: LogEvent) {
        let Some(event) = self.prepare(event) else {
            return;
        };
        match &self.queue {
            Some(queue) => {
                queue.enqueue_async(event, self.overflow_policy).await;
            }
            None => self.dispatcher.dispatch_async(&event).await,
        }
    }

    #[inline]
    pub fn trace(&self, message: impl Into<String>) {
        self.log(LogLevel::Trace, message);
    }

    #[inline]
    pub fn debug(&self, message: impl Into<String>) {
        self.log(LogLevel::Debug, message);
    }

    #[inline]
    pub fn info(&self, message: impl Into<String>) {
        self.log(LogLevel::Info, message);
    }

    #[inline]
    pub fn warn(&self, message: impl Into<String>) {
        self.log(LogLevel::Warn, message);
    }

    #[inline]
    pub fn error(&self, message: impl Into<String>) {
        self.log(LogLevel::Error, message);
    }

    #[inline]
    pub fn fatal(&self, message: impl Into<String>) {
        self.log(LogLevel::Fatal, message);
    }

    pub async fn trace_async(&self, message: impl Into<String>) {
        self.log_async(LogLevel::Trace, message).await;
    }

    pub async fn debug_async(&self, message: impl Into<String>) {
        self.log_async(LogLevel::Debug, message).await;
    }

    pub async fn info_async(&self, message: impl Into<String>) {
        self.log_async(LogLevel::Info, message).await;
    }

    pub async fn warn_async(&self, message: impl Into<String>) {
        self.log_async(LogLevel::Warn, message).await;
    }

    pub async fn error_async(&self, message: impl Into<String>) {
        self.log_async(LogLevel::Error, message).await;
    }

    pub async fn fatal_async(&self, message: impl Into<String>) {
        self.log_async(LogLevel::Fatal, message).await;
    }

    /// Push a context entry for the current task; see [`context::push`]
    pub fn begin_scope<K, V>(&self, key: K, value: V) -> ScopeGuard
    where
        K: Into<String>,
        V: Into<FieldValue>,
    {
        context::push(key, value)
    }

    /// Remove every context entry of the current task
    pub fn clear_context(&self) {
        context::clear();
    }

    /// Wait for the queue to empty and flush every writer.
    ///
    /// With a background queue this is advisory: see
    /// [`BackgroundQueue::flush`].
    pub fn flush(&self) {
        if let Some(queue) = &self.queue {
            queue.flush();
        }
        self.dispatcher.flush_writers();
    }

    pub async fn flush_async(&self) {
        if let Some(queue) = &self.queue {
            queue.flush_async().await;
        }
        self.dispatcher.flush_writers();
    }

    /// Block until every event accepted so far reached the writers.
    ///
    /// Without a background queue delivery is synchronous, so this returns
    /// `true` at once.
    pub fn wait_until_drained(&self, timeout: Duration) -> bool {
        match &self.queue {
            Some(queue) => queue.wait_until_drained(timeout),
            None => true,
        }
    }

    pub async fn wait_until_drained_async(&self, timeout: Duration) -> bool {
        match &self.queue {
            Some(queue) => queue.wait_until_drained_async(timeout).await,
            None => true,
        }
    }

    /// Get the engine metrics for detailed observability
    ///
    /// # Example
    ///
    /// ```
    /// use logflow::prelude::*;
    ///
    /// let engine = LoggerEngine::new(LoggerConfig::default()).unwrap();
    /// engine.debug("below the default threshold");
    /// engine.info("accepted");
    ///
    /// assert_eq!(engine.metrics().filtered(), 1);
    /// assert_eq!(engine.metrics().accepted(), 1);
    /// ```
    pub fn metrics(&self) -> &LoggerMetrics {
        &self.metrics
    }

    /// Gracefully shutdown the engine with a custom timeout
    ///
    /// Stops the background queue (delivering what it holds) and flushes
    /// the writers. Events logged afterwards are rejected when a queue is
    /// configured and delivered directly otherwise.
    ///
    /// # Returns
    ///
    /// `true` if the queue drained within `timeout`, `false` otherwise
    ///
    /// # Example
    ///
    /// ```no_run
    /// use logflow::prelude::*;
    /// use std::time::Duration;
    ///
    /// let engine = LoggerEngine::new(
    ///     LoggerConfig::builder()
    ///         .writer(ConsoleWriter::new())
    ///         .background_queue(QueueConfig::default())
    ///         .build(),
    /// )
    /// .unwrap();
    /// engine.info("Important message");
    ///
    /// if !engine.shutdown(Duration::from_secs(10)) {
    ///     eprintln!("Warning: logger shutdown timed out");
    /// }
    /// ```
    pub fn shutdown(&self, timeout: Duration) -> bool {
        let drained = match &self.queue {
            Some(queue) => queue.shutdown(timeout),
            None => true,
        };
        self.dispatcher.flush_writers();
        self.report_drop_total();
        drained
    }

    /// Announce the drop total unless that exact total was already reported
    fn report_drop_total(&self) {
        let total = self.metrics.dropped_count();
        if self.metrics.claim_drop_report(total) {
            self.report(&Diagnostic::EventsDropped { total });
        }
    }

    fn build_event(&self, level: LogLevel, message: String, error: Option<ErrorInfo>) -> LogEvent {
        let event = LogEvent::new(level, message).with_context(context::snapshot());
        match error {
            Some(error) => event.with_error(error),
            None => event,
        }
    }

    fn prepare(&self, event: LogEvent) -> Option<LogEvent> {
        if !self.should_log(&event) {
            self.metrics.record_filtered();
            return None;
        }
        self.metrics.record_accepted();
        Some(self.apply_formatter(event))
    }

    fn apply_formatter(&self, event: LogEvent) -> LogEvent {
        let Some(formatter) = &self.formatter else {
            return event;
        };
        match catch_unwind(AssertUnwindSafe(|| formatter.format(&event))) {
            Ok(message) => event.with_message(message),
            Err(panic_info) => {
                self.report(&Diagnostic::FormatterPanicked {
                    panic: panic_message(panic_info.as_ref()),
                });
                event
            }
        }
    }

    fn report(&self, diagnostic: &Diagnostic) {
        (self.diagnostics)(diagnostic);
    }
}

impl Drop for LoggerEngine {
    fn drop(&mut self) {
        // The queue drains itself with its configured timeout when dropped
        drop(self.queue.take());
        self.dispatcher.flush_writers();
        self.report_drop_total();
    }
}

impl std::fmt::Debug for LoggerEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoggerEngine")
            .field("min_level", &self.min_level)
            .field("writers", &self.writer_count())
            .field("queue", &self.queue)
            .field("overflow_policy", &self.overflow_policy)
            .finish()
    }
}
