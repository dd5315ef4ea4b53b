//! Console writer

use crate::core::{LogEvent, LogFormatter, LogLevel, LogWriter, Result};
use crate::formatters::PlainTextFormatter;
use colored::Colorize;
use std::io::Write;
use std::sync::Arc;

/// Writes one line per event to stdout, `Error` and `Fatal` to stderr
///
/// Without its own formatter the line is rendered by
/// [`PlainTextFormatter`]. An engine-level formatter has already replaced
/// the message by the time the event arrives here.
pub struct ConsoleWriter {
    use_colors: bool,
    formatter: Arc<dyn LogFormatter>,
}

impl ConsoleWriter {
    pub fn new() -> Self {
        Self {
            use_colors: true,
            formatter: Arc::new(PlainTextFormatter::new()),
        }
    }

    pub fn with_colors(use_colors: bool) -> Self {
        Self {
            use_colors,
            ..Self::new()
        }
    }

    /// Render lines with `formatter` instead of the plain-text layout
    ///
    /// # Example
    ///
    /// ```
    /// use logflow::formatters::JsonFormatter;
    /// use logflow::writers::ConsoleWriter;
    ///
    /// let writer = ConsoleWriter::with_colors(false).with_formatter(JsonFormatter::new());
    /// ```
    #[must_use]
    pub fn with_formatter<F: LogFormatter + 'static>(mut self, formatter: F) -> Self {
        self.formatter = Arc::new(formatter);
        self
    }

    fn render(&self, event: &LogEvent) -> String {
        let line = self.formatter.format(event);
        if self.use_colors {
            line.color(event.level().color_code()).to_string()
        } else {
            line
        }
    }
}

impl Default for ConsoleWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl LogWriter for ConsoleWriter {
    fn write(&self, event: &LogEvent) -> Result<()> {
        let line = self.render(event);
        match event.level() {
            LogLevel::Error | LogLevel::Fatal => writeln!(std::io::stderr().lock(), "{}", line)?,
            _ => writeln!(std::io::stdout().lock(), "{}", line)?,
        }
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        std::io::stdout().flush()?;
        std::io::stderr().flush()?;
        Ok(())
    }

    fn name(&self) -> &str {
        "console"
    }
}
