//! Probabilistic sampling for high-volume scenarios
//!
//! Keeps a configurable fraction of events while letting chosen levels
//! (by default `Error` and `Fatal`) through unconditionally. A per-category
//! rate applies when the event's context carries a `category` field.
//!
//! # Example
//!
//! ```
//! use logflow::filters::SamplingFilter;
//! use logflow::prelude::*;
//!
//! let engine = LoggerEngine::new(
//!     LoggerConfig::builder()
//!         .filter(SamplingFilter::new(0.1).with_category_rate("audit", 1.0))
//!         .build(),
//! )
//! .unwrap();
//! engine.info("kept about one time in ten");
//! ```

use crate::core::{FieldValue, LogEvent, LogFilter, LogLevel};
use rand::Rng;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Context key consulted for per-category rates
pub const CATEGORY_FIELD: &str = "category";

pub struct SamplingFilter {
    /// Fraction of events kept, between 0.0 and 1.0
    rate: f64,
    /// Levels that bypass sampling
    always_sample: Vec<LogLevel>,
    category_rates: HashMap<String, f64>,
    sampled: AtomicU64,
    rejected: AtomicU64,
}

impl SamplingFilter {
    /// Keep `rate` of the events; values outside [0, 1] are clamped and
    /// NaN keeps everything
    pub fn new(rate: f64) -> Self {
        Self {
            rate: normalize_rate(rate),
            always_sample: vec![LogLevel::Error, LogLevel::Fatal],
            category_rates: HashMap::new(),
            sampled: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
        }
    }

    /// Replace the set of levels that are never sampled out
    #[must_use]
    pub fn with_always_sample(mut self, levels: Vec<LogLevel>) -> Self {
        self.always_sample = levels;
        self
    }

    #[must_use]
    pub fn with_category_rate(mut self, category: impl Into<String>, rate: f64) -> Self {
        self.category_rates
            .insert(category.into(), normalize_rate(rate));
        self
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    pub fn sampled_count(&self) -> u64 {
        self.sampled.load(Ordering::Relaxed)
    }

    pub fn rejected_count(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    /// Observed fraction of events kept; 1.0 before any event was seen
    pub fn effective_sample_rate(&self) -> f64 {
        let sampled = self.sampled_count() as f64;
        let total = sampled + self.rejected_count() as f64;
        if total == 0.0 {
            1.0
        } else {
            sampled / total
        }
    }

    fn rate_for(&self, event: &LogEvent) -> f64 {
        let category = event
            .context()
            .and_then(|context| context.get(CATEGORY_FIELD));
        match category {
            Some(FieldValue::String(name)) => {
                self.category_rates.get(name).copied().unwrap_or(self.rate)
            }
            _ => self.rate,
        }
    }

    fn decide(&self, event: &LogEvent) -> bool {
        if self.always_sample.contains(&event.level()) {
            return true;
        }
        let rate = self.rate_for(event);
        if rate >= 1.0 {
            return true;
        }
        if rate <= 0.0 {
            return false;
        }
        rand::thread_rng().gen::<f64>() < rate
    }
}

fn normalize_rate(rate: f64) -> f64 {
    if rate.is_nan() {
        1.0
    } else {
        rate.clamp(0.0, 1.0)
    }
}

impl LogFilter for SamplingFilter {
    fn should_log(&self, event: &LogEvent) -> bool {
        let keep = self.decide(event);
        let counter = if keep { &self.sampled } else { &self.rejected };
        counter.fetch_add(1, Ordering::Relaxed);
        keep
    }
}

impl std::fmt::Debug for SamplingFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SamplingFilter")
            .field("rate", &self.rate)
            .field("always_sample", &self.always_sample)
            .field("category_rates", &self.category_rates)
            .field("sampled", &self.sampled_count())
            .field("rejected", &self.rejected_count())
            .finish()
    }
}
