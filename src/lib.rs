//! # logflow
//!
//! A structured-event logging pipeline: log calls become immutable events,
//! are gated by level and filter, optionally formatted, and delivered to
//! any number of writers either directly or through a bounded background
//! queue.
//!
//! ## Features
//!
//! - **Failure isolation**: a failing or panicking writer never affects
//!   the others, and nothing from the pipeline reaches the caller
//! - **Background queue**: batching consumer with backpressure or
//!   drop-on-full, chosen explicitly
//! - **Scoped context**: key/value scopes that follow a task across
//!   `.await` points
//! - **Blocking and async callers**: every log call has both forms
//!
//! ## Example
//!
//! ```
//! use logflow::prelude::*;
//! use std::time::Duration;
//!
//! let engine = LoggerEngine::new(
//!     LoggerConfig::builder()
//!         .min_level(LogLevel::Debug)
//!         .writer(ConsoleWriter::with_colors(false))
//!         .background_queue(QueueConfig::default())
//!         .build(),
//! )
//! .unwrap();
//!
//! let _request = engine.begin_scope("request_id", "abc-123");
//! engine.info("handling request");
//!
//! assert!(engine.wait_until_drained(Duration::from_secs(5)));
//! ```

pub mod core;
pub mod filters;
pub mod formatters;
pub mod macros;
pub mod writers;

pub mod prelude {
    #[cfg(feature = "console")]
    pub use crate::writers::ConsoleWriter;
    pub use crate::core::{
        context, ContextSnapshot, Diagnostic, DiagnosticHandler, ErrorInfo, FieldValue, LogEvent,
        LogFilter, LogFormatter, LogHandle, LogLevel, LogWriter, LoggerConfig, LoggerEngine,
        LoggerError, LoggerMetrics, OverflowPolicy, QueueConfig, Result, ScopeGuard,
        TimestampFormat, DEFAULT_SHUTDOWN_TIMEOUT,
    };
    pub use crate::filters::{MinimumLevelFilter, SamplingFilter};
    pub use crate::formatters::{JsonFormatter, PlainTextFormatter};
    #[cfg(feature = "file")]
    pub use crate::writers::{FileWriter, RotationPolicy};
}

pub use crate::core::{
    context, ContextSnapshot, Diagnostic, DiagnosticHandler, ErrorInfo, FieldValue, LogEvent,
    LogFilter, LogFormatter, LogHandle, LogLevel, LogWriter, LoggerConfig, LoggerConfigBuilder,
    LoggerEngine, LoggerError, LoggerMetrics, OverflowPolicy, QueueConfig, Result, ScopeGuard,
    TimestampFormat, DEFAULT_SHUTDOWN_TIMEOUT,
};
