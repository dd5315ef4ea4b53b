//! Fan-out delivery of events to every configured writer
//!
//! **Per-writer failure isolation**: each writer call is wrapped so that an
//! error or a panic in one writer is reported through diagnostics and never
//! stops delivery to the others, nor to later events for the same writer.

use super::{
    diagnostics::{panic_message, Diagnostic, DiagnosticHandler},
    error::Result,
    log_event::LogEvent,
    metrics::LoggerMetrics,
    writer::LogWriter,
};
use futures::future::join_all;
use futures::FutureExt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tokio::runtime::Handle;

pub struct Dispatcher {
    writers: Vec<Arc<dyn LogWriter>>,
    diagnostics: DiagnosticHandler,
    metrics: Arc<LoggerMetrics>,
}

impl Dispatcher {
    /// Capture `writers` in order; the list never changes afterwards
    pub fn new(
        writers: Vec<Arc<dyn LogWriter>>,
        diagnostics: DiagnosticHandler,
        metrics: Arc<LoggerMetrics>,
    ) -> Self {
        Self {
            writers,
            diagnostics,
            metrics,
        }
    }

    pub fn writer_count(&self) -> usize {
        self.writers.len()
    }

    pub fn metrics(&self) -> &Arc<LoggerMetrics> {
        &self.metrics
    }

    pub(crate) fn diagnostics(&self) -> &DiagnosticHandler {
        &self.diagnostics
    }

    /// Deliver to each writer in order on the calling thread
    pub fn dispatch(&self, event: &LogEvent) {
        for (idx, writer) in self.writers.iter().enumerate() {
            let outcome = catch_unwind(AssertUnwindSafe(|| writer.write(event)));
            self.settle(idx, writer.as_ref(), outcome);
        }
    }

    /// Deliver to each writer in order, awaiting each `write_async`
    pub async fn dispatch_async(&self, event: &LogEvent) {
        for (idx, writer) in self.writers.iter().enumerate() {
            let outcome = AssertUnwindSafe(writer.write_async(event))
                .catch_unwind()
                .await;
            self.settle(idx, writer.as_ref(), outcome);
        }
    }

    /// Deliver a batch: one delivery per writer, all writers concurrently.
    ///
    /// Within one writer the events arrive in batch order. Writers without
    /// a suspending write path each run on a blocking thread of their own
    /// when a tokio runtime is available, so a slow sink does not hold up
    /// the others. Returns once every writer has seen every event (or
    /// failed on it), after flushing each writer.
    pub async fn dispatch_batch(&self, events: &[LogEvent]) {
        if events.is_empty() {
            return;
        }

        let runtime = Handle::try_current()
            .ok()
            .filter(|_| self.writers.len() > 1);
        let shared: Option<Arc<[LogEvent]>> = runtime
            .as_ref()
            .filter(|_| self.writers.iter().any(|w| !w.is_async()))
            .map(|_| Arc::from(events));

        let deliveries = self.writers.iter().enumerate().map(|(idx, writer)| {
            let offload = match (&runtime, &shared) {
                (Some(runtime), Some(shared)) if !writer.is_async() => {
                    Some((runtime.clone(), Arc::clone(shared)))
                }
                _ => None,
            };
            async move {
                match offload {
                    Some((runtime, shared)) => {
                        self.deliver_on_thread(&runtime, idx, writer, shared).await
                    }
                    None => self.deliver_all(idx, writer.as_ref(), events).await,
                }
            }
        });
        join_all(deliveries).await;

        self.flush_writers();
    }

    async fn deliver_all(&self, idx: usize, writer: &dyn LogWriter, events: &[LogEvent]) {
        for event in events {
            let outcome = AssertUnwindSafe(writer.write_async(event))
                .catch_unwind()
                .await;
            self.settle(idx, writer, outcome);
        }
    }

    async fn deliver_on_thread(
        &self,
        runtime: &Handle,
        idx: usize,
        writer: &Arc<dyn LogWriter>,
        events: Arc<[LogEvent]>,
    ) {
        let task_writer = Arc::clone(writer);
        let diagnostics = Arc::clone(&self.diagnostics);
        let metrics = Arc::clone(&self.metrics);

        let task = runtime.spawn_blocking(move || {
            for event in events.iter() {
                let outcome = catch_unwind(AssertUnwindSafe(|| task_writer.write(event)));
                record_outcome(&diagnostics, &metrics, idx, task_writer.as_ref(), outcome);
            }
        });

        // every write is caught inside the task; this only fails when the
        // runtime is shutting down
        if let Err(e) = task.await {
            (self.diagnostics)(&Diagnostic::WriterFailed {
                index: idx,
                writer: writer.name().to_string(),
                error: format!("delivery task did not complete: {}", e),
            });
        }
    }

    /// Flush every writer, isolating failures the same way as writes
    pub fn flush_writers(&self) {
        for (idx, writer) in self.writers.iter().enumerate() {
            let error = match catch_unwind(AssertUnwindSafe(|| writer.flush())) {
                Ok(Ok(())) => continue,
                Ok(Err(e)) => e.to_string(),
                Err(panic_info) => format!("panicked: {}", panic_message(panic_info.as_ref())),
            };
            (self.diagnostics)(&Diagnostic::FlushFailed {
                index: idx,
                writer: writer.name().to_string(),
                error,
            });
        }
    }

    fn settle(
        &self,
        idx: usize,
        writer: &dyn LogWriter,
        outcome: std::thread::Result<Result<()>>,
    ) {
        record_outcome(&self.diagnostics, &self.metrics, idx, writer, outcome);
    }
}

fn record_outcome(
    diagnostics: &DiagnosticHandler,
    metrics: &LoggerMetrics,
    idx: usize,
    writer: &dyn LogWriter,
    outcome: std::thread::Result<Result<()>>,
) {
    let diagnostic = match outcome {
        Ok(Ok(())) => {
            metrics.record_delivered();
            return;
        }
        Ok(Err(e)) => Diagnostic::WriterFailed {
            index: idx,
            writer: writer.name().to_string(),
            error: e.to_string(),
        },
        Err(panic_info) => Diagnostic::WriterPanicked {
            index: idx,
            writer: writer.name().to_string(),
            panic: panic_message(panic_info.as_ref()),
        },
    };
    metrics.record_failed();
    diagnostics(&diagnostic);
}
