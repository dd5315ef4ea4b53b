//! Diagnostic side channel for failures the pipeline absorbs
//!
//! Nothing that goes wrong while delivering an event is returned to the
//! caller of a log method. Instead it is described by a [`Diagnostic`]
//! and handed to the configured [`DiagnosticHandler`]; the default
//! handler writes to stderr.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Callback receiving pipeline diagnostics
///
/// Must not log through the pipeline that reports to it.
pub type DiagnosticHandler = Arc<dyn Fn(&Diagnostic) + Send + Sync>;

#[derive(Debug, Clone, PartialEq)]
pub enum Diagnostic {
    /// A writer returned an error
    WriterFailed {
        index: usize,
        writer: String,
        error: String,
    },
    /// A writer panicked; other writers kept receiving events
    WriterPanicked {
        index: usize,
        writer: String,
        panic: String,
    },
    /// A writer's flush returned an error or panicked
    FlushFailed {
        index: usize,
        writer: String,
        error: String,
    },
    /// The filter panicked; the event was suppressed
    FilterPanicked { panic: String },
    /// The formatter panicked; the event kept its original message
    FormatterPanicked { panic: String },
    /// Events were dropped because the buffer was full
    EventsDropped { total: u64 },
    /// An event arrived after the queue started shutting down
    QueueRejected { message: String },
    /// The background consumer panicked
    ConsumerPanicked { panic: String },
    /// The consumer did not finish draining before the timeout
    ShutdownTimedOut { timeout: Duration },
    /// A file writer could not rotate or compress; it keeps appending to
    /// the active file
    RotationFailed { path: String, error: String },
}

impl Diagnostic {
    /// Whether this is a warning rather than an error
    pub fn is_warning(&self) -> bool {
        matches!(
            self,
            Diagnostic::EventsDropped { .. }
                | Diagnostic::QueueRejected { .. }
                | Diagnostic::ShutdownTimedOut { .. }
                | Diagnostic::RotationFailed { .. }
        )
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::WriterFailed { index, writer, error } => {
                write!(f, "Writer #{} ({}) failed: {}", index, writer, error)
            }
            Diagnostic::WriterPanicked { index, writer, panic } => write!(
                f,
                "Writer #{} ({}) panicked: {}. Other writers continue to function.",
                index, writer, panic
            ),
            Diagnostic::FlushFailed { index, writer, error } => {
                write!(f, "Writer #{} ({}) flush failed: {}", index, writer, error)
            }
            Diagnostic::FilterPanicked { panic } => {
                write!(f, "Filter panicked, event suppressed: {}", panic)
            }
            Diagnostic::FormatterPanicked { panic } => {
                write!(f, "Formatter panicked, message left unformatted: {}", panic)
            }
            Diagnostic::EventsDropped { total } => write!(
                f,
                "Queue full, {} events dropped. \
                 Consider increasing capacity or using OverflowPolicy::Block.",
                total
            ),
            Diagnostic::QueueRejected { message } => {
                write!(f, "Queue is shut down, event rejected: {}", message)
            }
            Diagnostic::ConsumerPanicked { panic } => {
                write!(f, "Background consumer panicked: {}", panic)
            }
            Diagnostic::ShutdownTimedOut { timeout } => write!(
                f,
                "Background consumer did not finish within {:?} timeout. \
                 Some events may be lost.",
                timeout
            ),
            Diagnostic::RotationFailed { path, error } => write!(
                f,
                "Rotation of '{}' failed: {}. Logging continues in the active file.",
                path, error
            ),
        }
    }
}

/// Handler writing `[LOGGER ERROR]` / `[LOGGER WARNING]` lines to stderr
pub fn stderr_handler() -> DiagnosticHandler {
    Arc::new(|diagnostic: &Diagnostic| {
        if diagnostic.is_warning() {
            eprintln!("[LOGGER WARNING] {}", diagnostic);
        } else {
            eprintln!("[LOGGER ERROR] {}", diagnostic);
        }
    })
}

/// Handler that discards everything
pub fn silent_handler() -> DiagnosticHandler {
    Arc::new(|_: &Diagnostic| {})
}

/// Render a `catch_unwind` payload
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let d = Diagnostic::WriterFailed {
            index: 1,
            writer: "file".to_string(),
            error: "disk full".to_string(),
        };
        assert_eq!(d.to_string(), "Writer #1 (file) failed: disk full");
        assert!(!d.is_warning());

        let d = Diagnostic::EventsDropped { total: 3 };
        assert!(d.to_string().starts_with("Queue full, 3 events dropped"));
        assert!(d.is_warning());
    }

    #[test]
    fn test_panic_message() {
        let payload = std::panic::catch_unwind(|| panic!("boom")).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "boom");

        let payload = std::panic::catch_unwind(|| panic!("code {}", 7)).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "code 7");
    }
}
