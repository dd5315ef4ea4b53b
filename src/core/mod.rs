//! Core pipeline types and traits

pub mod background_queue;
mod bounded_buffer;
pub mod config;
pub mod context;
pub mod diagnostics;
pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod formatter;
pub mod handle;
pub mod log_context;
pub mod log_event;
pub mod log_level;
pub mod metrics;
pub mod overflow_policy;
pub mod timestamp;
pub mod writer;

pub use background_queue::BackgroundQueue;
pub use config::{LoggerConfig, LoggerConfigBuilder, QueueConfig, DEFAULT_SHUTDOWN_TIMEOUT};
pub use context::ScopeGuard;
pub use diagnostics::{Diagnostic, DiagnosticHandler};
pub use dispatcher::Dispatcher;
pub use engine::LoggerEngine;
pub use error::{LoggerError, Result};
pub use formatter::{LogFilter, LogFormatter};
pub use handle::LogHandle;
pub use log_context::{ContextSnapshot, FieldValue};
pub use log_event::{ErrorInfo, LogEvent};
pub use log_level::LogLevel;
pub use metrics::LoggerMetrics;
pub use overflow_policy::OverflowPolicy;
pub use timestamp::TimestampFormat;
pub use writer::LogWriter;
