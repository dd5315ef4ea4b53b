//! Writer trait for log output destinations

use super::{error::Result, log_event::LogEvent};
use async_trait::async_trait;

/// A delivery target for log events.
///
/// Writers are shared: the same instance may be reached from direct
/// dispatch and from the background queue at the same time, so every
/// method takes `&self` and implementations must synchronize internally.
///
/// `write_async` defaults to the blocking `write`; override it when the
/// sink has a genuinely non-blocking path, and return `true` from
/// [`is_async`](LogWriter::is_async) so batch delivery awaits it in place
/// instead of giving the writer a blocking thread of its own.
///
/// # Example
///
/// ```
/// use logflow::core::{LogEvent, LogWriter, Result};
/// use parking_lot::Mutex;
///
/// #[derive(Default)]
/// struct Collect(Mutex<Vec<String>>);
///
/// impl LogWriter for Collect {
///     fn write(&self, event: &LogEvent) -> Result<()> {
///         self.0.lock().push(event.message().to_string());
///         Ok(())
///     }
///
///     fn name(&self) -> &str {
///         "collect"
///     }
/// }
/// ```
#[async_trait]
pub trait LogWriter: Send + Sync {
    /// Deliver an event, blocking the caller until done
    fn write(&self, event: &LogEvent) -> Result<()>;

    /// Deliver an event asynchronously
    async fn write_async(&self, event: &LogEvent) -> Result<()> {
        self.write(event)
    }

    /// Whether `write_async` suspends rather than blocks
    fn is_async(&self) -> bool {
        false
    }

    /// Flush anything the writer buffers internally
    fn flush(&self) -> Result<()> {
        Ok(())
    }

    /// Get the writer name, used in diagnostics
    fn name(&self) -> &str;
}
