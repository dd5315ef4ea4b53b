//! Formatter and filter capabilities applied by the engine before routing

use super::log_event::LogEvent;

/// Renders an event into the message writers will receive.
///
/// Called once per event that passed the gate. Closures of type
/// `Fn(&LogEvent) -> String` are formatters too.
pub trait LogFormatter: Send + Sync {
    fn format(&self, event: &LogEvent) -> String;
}

impl<F> LogFormatter for F
where
    F: Fn(&LogEvent) -> String + Send + Sync,
{
    fn format(&self, event: &LogEvent) -> String {
        self(event)
    }
}

/// Decides whether an event that met the minimum level is delivered.
///
/// Closures of type `Fn(&LogEvent) -> bool` are filters too.
pub trait LogFilter: Send + Sync {
    fn should_log(&self, event: &LogEvent) -> bool;
}

impl<F> LogFilter for F
where
    F: Fn(&LogEvent) -> bool + Send + Sync,
{
    fn should_log(&self, event: &LogEvent) -> bool {
        self(event)
    }
}
