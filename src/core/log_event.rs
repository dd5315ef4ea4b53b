//! Immutable log event produced once per log call

use super::log_context::ContextSnapshot;
use super::log_level::LogLevel;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::error::Error as StdError;

/// Error attached to an event: type name, display message and the
/// rendered `source()` chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    #[serde(rename = "type")]
    pub type_name: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace: Option<String>,
}

impl ErrorInfo {
    pub fn new(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            message: message.into(),
            trace: None,
        }
    }

    #[must_use]
    pub fn with_trace(mut self, trace: impl Into<String>) -> Self {
        self.trace = Some(trace.into());
        self
    }

    /// Capture an error value, walking its `source()` chain into `trace`.
    pub fn from_error<E: StdError + ?Sized>(error: &E) -> Self {
        let mut causes = Vec::new();
        let mut source = error.source();
        while let Some(cause) = source {
            causes.push(format!("caused by: {}", cause));
            source = cause.source();
        }

        Self {
            type_name: short_type_name(std::any::type_name::<E>()),
            message: error.to_string(),
            trace: (!causes.is_empty()).then(|| causes.join("\n")),
        }
    }
}

/// `my_crate::io::ReadError` -> `ReadError`; generic arguments are kept.
fn short_type_name(full: &str) -> String {
    let base = full.split('<').next().unwrap_or(full);
    match base.rfind("::") {
        Some(idx) => full[idx + 2..].to_string(),
        None => full.to_string(),
    }
}

/// A single log event.
///
/// Events are never mutated after construction. [`LogEvent::with_message`]
/// produces a new event that differs only in its message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEvent {
    timestamp: DateTime<Utc>,
    level: LogLevel,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ErrorInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    context: Option<ContextSnapshot>,
}

impl LogEvent {
    /// Create an event stamped with the current UTC time
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self::at(Utc::now(), level, message)
    }

    /// Create an event with an explicit timestamp
    pub fn at(timestamp: DateTime<Utc>, level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            timestamp,
            level,
            message: message.into(),
            error: None,
            context: None,
        }
    }

    #[must_use]
    pub fn with_error(mut self, error: ErrorInfo) -> Self {
        self.error = Some(error);
        self
    }

    /// Attach a context snapshot; an empty snapshot is stored as absent.
    #[must_use]
    pub fn with_context(mut self, context: ContextSnapshot) -> Self {
        self.context = (!context.is_empty()).then_some(context);
        self
    }

    /// Copy of this event with only the message replaced
    #[must_use]
    pub fn with_message(&self, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..self.clone()
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn level(&self) -> LogLevel {
        self.level
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn error(&self) -> Option<&ErrorInfo> {
        self.error.as_ref()
    }

    pub fn context(&self) -> Option<&ContextSnapshot> {
        self.context.as_ref()
    }
}
