//! JSON formatter for log aggregation tools

use crate::core::{LogEvent, LogFormatter, TimestampFormat};
use serde_json::{Map, Value};

/// Renders an event as one JSON object
///
/// Keys: `timestamp`, `level`, `message`, then `exception`
/// (`type`, `message`, `trace`) and `context` when present.
///
/// # Example
///
/// ```
/// use logflow::formatters::JsonFormatter;
/// use logflow::{LogEvent, LogFormatter, LogLevel};
///
/// let line = JsonFormatter::new().format(&LogEvent::new(LogLevel::Info, "started"));
/// let value: serde_json::Value = serde_json::from_str(&line).unwrap();
/// assert_eq!(value["level"], "INFO");
/// assert_eq!(value["message"], "started");
/// ```
#[derive(Debug, Clone, Default)]
pub struct JsonFormatter {
    pretty: bool,
    timestamp_format: TimestampFormat,
}

impl JsonFormatter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Multi-line indented output
    pub fn pretty() -> Self {
        Self {
            pretty: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_timestamp_format(mut self, format: TimestampFormat) -> Self {
        self.timestamp_format = format;
        self
    }

    fn to_value(&self, event: &LogEvent) -> Value {
        let mut object = Map::new();
        object.insert(
            "timestamp".to_string(),
            self.timestamp_format.to_json_value(&event.timestamp()),
        );
        object.insert("level".to_string(), Value::from(event.level().to_str()));
        object.insert("message".to_string(), Value::from(event.message()));

        if let Some(error) = event.error() {
            let mut exception = Map::new();
            exception.insert("type".to_string(), Value::from(error.type_name.as_str()));
            exception.insert("message".to_string(), Value::from(error.message.as_str()));
            if let Some(trace) = &error.trace {
                exception.insert("trace".to_string(), Value::from(trace.as_str()));
            }
            object.insert("exception".to_string(), Value::Object(exception));
        }

        if let Some(context) = event.context() {
            let fields = context
                .iter()
                .map(|(key, value)| (key.clone(), value.to_json_value()))
                .collect();
            object.insert("context".to_string(), Value::Object(fields));
        }

        Value::Object(object)
    }
}

impl LogFormatter for JsonFormatter {
    fn format(&self, event: &LogEvent) -> String {
        let value = self.to_value(event);
        let rendered = if self.pretty {
            serde_json::to_string_pretty(&value)
        } else {
            serde_json::to_string(&value)
        };
        // Serializing a `Value` built from strings and numbers cannot fail
        rendered.unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ContextSnapshot, ErrorInfo, LogLevel};

    #[test]
    fn test_exception_and_context() {
        let event = LogEvent::new(LogLevel::Error, "query failed")
            .with_error(ErrorInfo::new("DbError", "timeout").with_trace("caused by: socket closed"))
            .with_context(ContextSnapshot::new().with_field("user_id", 42).with_field("retry", true));

        let value: Value = serde_json::from_str(&JsonFormatter::new().format(&event)).unwrap();

        assert_eq!(value["level"], "ERROR");
        assert_eq!(value["exception"]["type"], "DbError");
        assert_eq!(value["exception"]["trace"], "caused by: socket closed");
        assert_eq!(value["context"]["user_id"], 42);
        assert_eq!(value["context"]["retry"], true);
    }

    #[test]
    fn test_absent_sections_are_omitted() {
        let line = JsonFormatter::new().format(&LogEvent::new(LogLevel::Info, "plain"));
        let value: Value = serde_json::from_str(&line).unwrap();

        assert!(value.get("exception").is_none());
        assert!(value.get("context").is_none());
        assert!(!line.contains('\n'));
    }

    #[test]
    fn test_pretty_and_numeric_timestamp() {
        let formatter = JsonFormatter::pretty().with_timestamp_format(TimestampFormat::UnixMillis);
        let line = formatter.format(&LogEvent::new(LogLevel::Warn, "slow"));

        assert!(line.contains('\n'));
        let value: Value = serde_json::from_str(&line).unwrap();
        assert!(value["timestamp"].is_i64());
    }
}
