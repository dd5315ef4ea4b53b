//! Single-line human-readable formatter

use crate::core::{LogEvent, LogFormatter, TimestampFormat};

/// Renders `[timestamp] [LEVEL] message EX: Type: msg ctx: k=v, k=v`
///
/// Empty parts are skipped. Line breaks and tabs in the message are
/// escaped so that one event always stays on one line.
///
/// # Example
///
/// ```
/// use logflow::formatters::PlainTextFormatter;
/// use logflow::{LogEvent, LogFormatter, LogLevel, TimestampFormat};
/// use chrono::{TimeZone, Utc};
///
/// let at = Utc.with_ymd_and_hms(2025, 1, 8, 10, 30, 45).unwrap();
/// let event = LogEvent::at(at, LogLevel::Warn, "disk almost full");
///
/// let formatter = PlainTextFormatter::new();
/// assert_eq!(
///     formatter.format(&event),
///     "[2025-01-08 10:30:45] [WARN] disk almost full"
/// );
/// ```
#[derive(Debug, Clone)]
pub struct PlainTextFormatter {
    timestamp_format: TimestampFormat,
}

impl PlainTextFormatter {
    pub fn new() -> Self {
        Self {
            timestamp_format: TimestampFormat::Custom("%Y-%m-%d %H:%M:%S".to_string()),
        }
    }

    #[must_use]
    pub fn with_timestamp_format(mut self, format: TimestampFormat) -> Self {
        self.timestamp_format = format;
        self
    }
}

impl Default for PlainTextFormatter {
    fn default() -> Self {
        Self::new()
    }
}

impl LogFormatter for PlainTextFormatter {
    fn format(&self, event: &LogEvent) -> String {
        let mut line = format!(
            "[{}] [{}]",
            self.timestamp_format.format(&event.timestamp()),
            event.level()
        );

        let message = escape_line_breaks(event.message());
        if !message.trim().is_empty() {
            line.push(' ');
            line.push_str(&message);
        }

        if let Some(error) = event.error() {
            line.push_str(&format!(" EX: {}: {}", error.type_name, error.message));
        }

        if let Some(context) = event.context().filter(|c| !c.is_empty()) {
            line.push_str(" ctx: ");
            line.push_str(&context.format_fields(", "));
        }

        line
    }
}

/// Escape characters that would let a message forge extra log lines
pub(crate) fn escape_line_breaks(message: &str) -> std::borrow::Cow<'_, str> {
    if !message.contains(['\n', '\r', '\t']) {
        return std::borrow::Cow::Borrowed(message);
    }
    let mut escaped = String::with_capacity(message.len() + 8);
    for c in message.chars() {
        match c {
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            '\t' => escaped.push_str("\\t"),
            other => escaped.push(other),
        }
    }
    std::borrow::Cow::Owned(escaped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ContextSnapshot, ErrorInfo, LogLevel};
    use chrono::{DateTime, TimeZone, Utc};

    fn fixed_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 8, 10, 30, 45)
            .single()
            .expect("valid datetime")
    }

    #[test]
    fn test_full_line() {
        let event = LogEvent::at(fixed_time(), LogLevel::Error, "upload failed")
            .with_error(ErrorInfo::new("IoError", "connection reset"))
            .with_context(
                ContextSnapshot::new()
                    .with_field("request_id", "r-9")
                    .with_field("attempt", 3),
            );

        assert_eq!(
            PlainTextFormatter::new().format(&event),
            "[2025-01-08 10:30:45] [ERROR] upload failed EX: IoError: connection reset \
             ctx: attempt=3, request_id=r-9"
        );
    }

    #[test]
    fn test_message_injection_is_escaped() {
        let event = LogEvent::at(
            fixed_time(),
            LogLevel::Info,
            "user=bob\n[2025-01-08 10:30:46] [FATAL] forged",
        );

        let line = PlainTextFormatter::new().format(&event);
        assert!(!line.contains('\n'));
        assert!(line.contains("user=bob\\n[2025"));
    }

    #[test]
    fn test_custom_timestamp_and_empty_message() {
        let event = LogEvent::at(fixed_time(), LogLevel::Debug, "  ");
        let formatter =
            PlainTextFormatter::new().with_timestamp_format(TimestampFormat::Iso8601);

        assert_eq!(formatter.format(&event), "[2025-01-08T10:30:45.000Z] [DEBUG]");
    }
}
