//! Pipeline metrics for observability
//!
//! Counters for the engine gate, the background queue and per-writer
//! delivery, so overflow drops and sink failures are observable instead
//! of silent.

use std::sync::atomic::{AtomicU64, Ordering};

/// Metrics for logger observability
///
/// # Example
///
/// ```
/// use logflow::LoggerMetrics;
///
/// let metrics = LoggerMetrics::new();
///
/// metrics.record_dropped();
/// metrics.record_delivered();
///
/// assert_eq!(metrics.dropped_count(), 1);
/// assert_eq!(metrics.delivered_writes(), 1);
/// ```
#[derive(Debug)]
pub struct LoggerMetrics {
    /// Events that passed the level and filter gate
    accepted: AtomicU64,

    /// Events rejected by the level or filter gate
    filtered: AtomicU64,

    /// Events inserted into the background buffer
    enqueued: AtomicU64,

    /// Events dropped because the buffer was full or closed
    dropped_count: AtomicU64,

    /// Number of times a producer had to wait for buffer space
    block_events: AtomicU64,

    /// Successful writer invocations
    delivered_writes: AtomicU64,

    /// Writer invocations that returned an error or panicked
    failed_writes: AtomicU64,

    /// Batches handed to the dispatcher by the consumer
    batches: AtomicU64,

    /// Highest drop total already announced through diagnostics
    reported_drops: AtomicU64,
}

impl LoggerMetrics {
    /// Create a new metrics instance with all counters at zero
    pub const fn new() -> Self {
        Self {
            accepted: AtomicU64::new(0),
            filtered: AtomicU64::new(0),
            enqueued: AtomicU64::new(0),
            dropped_count: AtomicU64::new(0),
            block_events: AtomicU64::new(0),
            delivered_writes: AtomicU64::new(0),
            failed_writes: AtomicU64::new(0),
            batches: AtomicU64::new(0),
            reported_drops: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn accepted(&self) -> u64 {
        self.accepted.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn filtered(&self) -> u64 {
        self.filtered.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn enqueued(&self) -> u64 {
        self.enqueued.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn dropped_count(&self) -> u64 {
        self.dropped_count.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn block_events(&self) -> u64 {
        self.block_events.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn delivered_writes(&self) -> u64 {
        self.delivered_writes.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn failed_writes(&self) -> u64 {
        self.failed_writes.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn batches(&self) -> u64 {
        self.batches.load(Ordering::Relaxed)
    }

    /// Claim the right to announce `total` drops; false when that total
    /// (or a higher one) was already announced
    pub(crate) fn claim_drop_report(&self, total: u64) -> bool {
        total > 0 && self.reported_drops.fetch_max(total, Ordering::Relaxed) < total
    }

    #[inline]
    pub fn record_accepted(&self) -> u64 {
        self.accepted.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_filtered(&self) -> u64 {
        self.filtered.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_enqueued(&self) -> u64 {
        self.enqueued.fetch_add(1, Ordering::Relaxed)
    }

    /// Record a dropped event; returns the previous count
    #[inline]
    pub fn record_dropped(&self) -> u64 {
        self.dropped_count.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_block(&self) -> u64 {
        self.block_events.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_delivered(&self) -> u64 {
        self.delivered_writes.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_failed(&self) -> u64 {
        self.failed_writes.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_batch(&self) -> u64 {
        self.batches.fetch_add(1, Ordering::Relaxed)
    }

    /// Failed writer invocations as a percentage (0.0 - 100.0)
    ///
    /// Returns 0.0 if nothing has been written yet.
    pub fn delivery_failure_rate(&self) -> f64 {
        let failed = self.failed_writes() as f64;
        let total = self.delivered_writes() as f64 + failed;
        if total == 0.0 {
            0.0
        } else {
            (failed / total) * 100.0
        }
    }

    /// Reset all metrics to zero
    pub fn reset(&self) {
        for counter in [
            &self.accepted,
            &self.filtered,
            &self.enqueued,
            &self.dropped_count,
            &self.block_events,
            &self.delivered_writes,
            &self.failed_writes,
            &self.batches,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

impl Default for LoggerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for LoggerMetrics {
    /// Create a snapshot of the current metrics values
    fn clone(&self) -> Self {
        Self {
            accepted: AtomicU64::new(self.accepted()),
            filtered: AtomicU64::new(self.filtered()),
            enqueued: AtomicU64::new(self.enqueued()),
            dropped_count: AtomicU64::new(self.dropped_count()),
            block_events: AtomicU64::new(self.block_events()),
            delivered_writes: AtomicU64::new(self.delivered_writes()),
            failed_writes: AtomicU64::new(self.failed_writes()),
            batches: AtomicU64::new(self.batches()),
            reported_drops: AtomicU64::new(self.reported_drops.load(Ordering::Relaxed)),
        }
    }
}
