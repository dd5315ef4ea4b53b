//! Background queue decoupling producers from writer I/O
//!
//! Producers insert into a bounded buffer; a single consumer on a dedicated
//! thread drains it in batches and hands each batch to the [`Dispatcher`].
//! The consumer runs its own current-thread tokio runtime so that async
//! writers work regardless of whether (or which) runtime the producers use.
//!
//! Consumer loop:
//! 1. Take up to `batch_size` buffered events.
//! 2. If anything was taken, deliver it and go straight back to step 1.
//! 3. Otherwise sleep until the next `flush_interval` tick or cancellation.
//! 4. On cancellation, deliver everything still buffered as one final batch.

use super::{
    bounded_buffer::{BoundedBuffer, PushError},
    config::QueueConfig,
    diagnostics::{panic_message, Diagnostic},
    dispatcher::Dispatcher,
    error::{LoggerError, Result},
    log_event::LogEvent,
    metrics::LoggerMetrics,
    overflow_policy::OverflowPolicy,
};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tokio::sync::Notify;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Drops between two `EventsDropped` diagnostics after the first one
const DROP_ALERT_INTERVAL: u64 = 1000;

const FLUSH_POLL_INTERVAL: Duration = Duration::from_millis(10);
const FLUSH_GRACE_PERIOD: Duration = Duration::from_millis(50);

/// Delivered event count, compared against the buffer's insert count by
/// the drain barrier
struct DrainProgress {
    completed: Mutex<u64>,
    advanced: Condvar,
    advanced_notify: Notify,
    consumer_exited: AtomicBool,
}

impl DrainProgress {
    fn new() -> Self {
        Self {
            completed: Mutex::new(0),
            advanced: Condvar::new(),
            advanced_notify: Notify::new(),
            consumer_exited: AtomicBool::new(false),
        }
    }

    fn completed(&self) -> u64 {
        *self.completed.lock()
    }

    fn advance(&self, delivered: u64) {
        *self.completed.lock() += delivered;
        self.wake();
    }

    fn mark_exited(&self) {
        // under the lock, so a waiter between its check and its wait
        // cannot miss the wakeup
        let _completed = self.completed.lock();
        self.consumer_exited.store(true, Ordering::Release);
        self.advanced.notify_all();
        self.advanced_notify.notify_waiters();
    }

    fn has_exited(&self) -> bool {
        self.consumer_exited.load(Ordering::Acquire)
    }

    fn wake(&self) {
        self.advanced.notify_all();
        self.advanced_notify.notify_waiters();
    }

    fn wait_for(&self, target: u64, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut completed = self.completed.lock();
        while *completed < target {
            if self.has_exited() || self.advanced.wait_until(&mut completed, deadline).timed_out() {
                return *completed >= target;
            }
        }
        true
    }

    async fn wait_for_async(&self, target: u64, timeout: Duration) -> bool {
        let reached = async {
            loop {
                let advanced = self.advanced_notify.notified();
                tokio::pin!(advanced);
                advanced.as_mut().enable();

                if self.completed() >= target || self.has_exited() {
                    return;
                }
                advanced.await;
            }
        };
        // A timeout is not a failure by itself: the count may have caught up
        // in the same instant.
        let _ = tokio::time::timeout(timeout, reached).await;
        self.completed() >= target
    }
}

/// Signals the owner when the consumer thread ends, including by panic
struct ExitSignal {
    progress: Arc<DrainProgress>,
    done: Sender<()>,
}

impl Drop for ExitSignal {
    fn drop(&mut self) {
        self.progress.mark_exited();
        let _ = self.done.try_send(());
    }
}

struct Worker {
    thread: thread::JoinHandle<()>,
    done: Receiver<()>,
}

struct Consumer {
    buffer: Arc<BoundedBuffer<LogEvent>>,
    dispatcher: Arc<Dispatcher>,
    progress: Arc<DrainProgress>,
    cancel: CancellationToken,
    batch_size: usize,
    flush_interval: Duration,
}

impl Consumer {
    async fn run(self) {
        let mut batch = Vec::with_capacity(self.batch_size);
        let mut ticker = tokio::time::interval_at(
            tokio::time::Instant::now() + self.flush_interval,
            self.flush_interval,
        );
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        while !self.cancel.is_cancelled() {
            if self.buffer.drain_into(&mut batch, self.batch_size) > 0 {
                self.deliver(&mut batch).await;
                continue;
            }

            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }
        }

        // The buffer is closed before cancellation, so this sees everything
        // that will ever be accepted.
        self.buffer.drain_into(&mut batch, usize::MAX);
        self.deliver(&mut batch).await;
    }

    async fn deliver(&self, batch: &mut Vec<LogEvent>) {
        if batch.is_empty() {
            return;
        }
        self.dispatcher.dispatch_batch(batch).await;
        self.dispatcher.metrics().record_batch();
        self.progress.advance(batch.len() as u64);
        batch.clear();
    }
}

/// Bounded buffer plus a dedicated consumer delivering in batches
///
/// # Example
///
/// ```
/// use logflow::core::{BackgroundQueue, Dispatcher, LoggerMetrics, QueueConfig};
/// use logflow::core::diagnostics::silent_handler;
/// use logflow::{LogEvent, LogLevel};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// let dispatcher = Arc::new(Dispatcher::new(
///     Vec::new(),
///     silent_handler(),
///     Arc::new(LoggerMetrics::new()),
/// ));
/// let queue = BackgroundQueue::new(dispatcher, &QueueConfig::default()).unwrap();
///
/// queue.enqueue_blocking(LogEvent::new(LogLevel::Info, "queued")).unwrap();
/// assert!(queue.shutdown(Duration::from_secs(5)));
/// ```
pub struct BackgroundQueue {
    buffer: Arc<BoundedBuffer<LogEvent>>,
    dispatcher: Arc<Dispatcher>,
    progress: Arc<DrainProgress>,
    cancel: CancellationToken,
    worker: Mutex<Option<Worker>>,
    shutdown_timeout: Duration,
}

impl BackgroundQueue {
    /// Validate `config` and start the consumer thread
    pub fn new(dispatcher: Arc<Dispatcher>, config: &QueueConfig) -> Result<Self> {
        config.validate()?;

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| LoggerError::ConsumerStart(e.to_string()))?;

        let buffer = Arc::new(BoundedBuffer::new(config.capacity));
        let progress = Arc::new(DrainProgress::new());
        let cancel = CancellationToken::new();
        let (done_tx, done_rx) = bounded(1);

        let consumer = Consumer {
            buffer: Arc::clone(&buffer),
            dispatcher: Arc::clone(&dispatcher),
            progress: Arc::clone(&progress),
            cancel: cancel.clone(),
            batch_size: config.batch_size,
            flush_interval: config.flush_interval,
        };
        let exit = ExitSignal {
            progress: Arc::clone(&progress),
            done: done_tx,
        };

        let thread = thread::Builder::new()
            .name("logflow-consumer".to_string())
            .spawn(move || {
                let _exit = exit;
                runtime.block_on(consumer.run());
            })
            .map_err(|e| LoggerError::ConsumerStart(e.to_string()))?;

        Ok(Self {
            buffer,
            dispatcher,
            progress,
            cancel,
            worker: Mutex::new(Some(Worker {
                thread,
                done: done_rx,
            })),
            shutdown_timeout: config.shutdown_timeout,
        })
    }

    pub fn capacity(&self) -> usize {
        self.buffer.capacity()
    }

    /// Events buffered and not yet taken by the consumer
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_closed(&self) -> bool {
        self.buffer.is_closed()
    }

    pub fn metrics(&self) -> &Arc<LoggerMetrics> {
        self.dispatcher.metrics()
    }

    /// Insert without waiting.
    ///
    /// Returns `false` when the buffer is full or closed; the event is
    /// dropped and counted.
    pub fn try_enqueue(&self, event: LogEvent) -> bool {
        match self.buffer.try_push(event) {
            Ok(()) => {
                self.accepted();
                true
            }
            Err(PushError::Full(_)) => {
                self.dropped();
                false
            }
            Err(PushError::Closed(event)) => {
                self.rejected(&event);
                false
            }
        }
    }

    /// Insert, parking the calling thread while the buffer is full
    ///
    /// Fails with [`LoggerError::QueueClosed`] once shutdown has started.
    pub fn enqueue_blocking(&self, event: LogEvent) -> Result<()> {
        let event = match self.buffer.try_push(event) {
            Ok(()) => return Ok(self.accepted()),
            Err(PushError::Full(event)) => event,
            Err(PushError::Closed(event)) => return Err(self.rejected(&event)),
        };

        self.metrics().record_block();
        match self.buffer.push_blocking(event) {
            Ok(()) => Ok(self.accepted()),
            Err(event) => Err(self.rejected(&event)),
        }
    }

    /// Insert, suspending the calling task while the buffer is full
    pub async fn enqueue_blocking_async(&self, event: LogEvent) -> Result<()> {
        let event = match self.buffer.try_push(event) {
            Ok(()) => return Ok(self.accepted()),
            Err(PushError::Full(event)) => event,
            Err(PushError::Closed(event)) => return Err(self.rejected(&event)),
        };

        self.metrics().record_block();
        match self.buffer.push(event).await {
            Ok(()) => Ok(self.accepted()),
            Err(event) => Err(self.rejected(&event)),
        }
    }

    /// Insert following `policy` from a blocking caller; `true` if accepted
    pub fn enqueue(&self, event: LogEvent, policy: OverflowPolicy) -> bool {
        match policy {
            OverflowPolicy::Block => self.enqueue_blocking(event).is_ok(),
            OverflowPolicy::DropNewest => self.try_enqueue(event),
        }
    }

    /// Insert following `policy` from an async caller; `true` if accepted
    pub async fn enqueue_async(&self, event: LogEvent, policy: OverflowPolicy) -> bool {
        match policy {
            OverflowPolicy::Block => self.enqueue_blocking_async(event).await.is_ok(),
            OverflowPolicy::DropNewest => self.try_enqueue(event),
        }
    }

    /// Wait for the buffer to empty, then a short grace period.
    ///
    /// Advisory only: an event the consumer has taken may still be in
    /// flight to the writers when this returns. Use
    /// [`wait_until_drained`](Self::wait_until_drained) for a guarantee.
    pub fn flush(&self) {
        while !self.is_empty() && !self.progress.has_exited() {
            thread::sleep(FLUSH_POLL_INTERVAL);
        }
        thread::sleep(FLUSH_GRACE_PERIOD);
    }

    /// Async form of [`flush`](Self::flush)
    pub async fn flush_async(&self) {
        while !self.is_empty() && !self.progress.has_exited() {
            tokio::time::sleep(FLUSH_POLL_INTERVAL).await;
        }
        tokio::time::sleep(FLUSH_GRACE_PERIOD).await;
    }

    /// Block until every event accepted before this call has been handed to
    /// all writers, or `timeout` elapses. Returns whether that happened.
    pub fn wait_until_drained(&self, timeout: Duration) -> bool {
        self.progress.wait_for(self.buffer.pushed(), timeout)
    }

    /// Async form of [`wait_until_drained`](Self::wait_until_drained)
    pub async fn wait_until_drained_async(&self, timeout: Duration) -> bool {
        self.progress
            .wait_for_async(self.buffer.pushed(), timeout)
            .await
    }

    /// Stop accepting events, deliver what is buffered and stop the consumer
    ///
    /// # Returns
    ///
    /// `true` if the consumer finished within `timeout`. On timeout the
    /// consumer is left to finish on its own and a diagnostic is emitted.
    /// Calling this again after it has completed returns `true` at once.
    pub fn shutdown(&self, timeout: Duration) -> bool {
        self.buffer.close();
        self.cancel.cancel();

        let Some(worker) = self.worker.lock().take() else {
            return true;
        };

        match worker.done.recv_timeout(timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => match worker.thread.join() {
                Ok(()) => true,
                Err(panic_info) => {
                    self.report(&Diagnostic::ConsumerPanicked {
                        panic: panic_message(panic_info.as_ref()),
                    });
                    false
                }
            },
            Err(RecvTimeoutError::Timeout) => {
                self.report(&Diagnostic::ShutdownTimedOut { timeout });
                false
            }
        }
    }

    fn accepted(&self) {
        self.metrics().record_enqueued();
    }

    fn dropped(&self) {
        let total = self.metrics().record_dropped() + 1;
        // first drop and periodically thereafter
        if (total == 1 || total % DROP_ALERT_INTERVAL == 0)
            && self.metrics().claim_drop_report(total)
        {
            self.report(&Diagnostic::EventsDropped { total });
        }
    }

    fn rejected(&self, event: &LogEvent) -> LoggerError {
        self.metrics().record_dropped();
        self.report(&Diagnostic::QueueRejected {
            message: event.message().to_string(),
        });
        LoggerError::QueueClosed
    }

    fn report(&self, diagnostic: &Diagnostic) {
        (self.dispatcher.diagnostics())(diagnostic);
    }
}

impl Drop for BackgroundQueue {
    fn drop(&mut self) {
        self.shutdown(self.shutdown_timeout);
    }
}

impl std::fmt::Debug for BackgroundQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackgroundQueue")
            .field("capacity", &self.capacity())
            .field("len", &self.len())
            .field("closed", &self.is_closed())
            .finish()
    }
}
