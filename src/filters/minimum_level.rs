//! Level threshold as a standalone filter

use crate::core::{LogEvent, LogFilter, LogLevel};

/// Passes events at or above a level
///
/// Useful when combined with the engine's own threshold, e.g. to keep a
/// verbose engine level for one writer while filtering at another place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MinimumLevelFilter {
    minimum: LogLevel,
}

impl MinimumLevelFilter {
    pub fn new(minimum: LogLevel) -> Self {
        Self { minimum }
    }

    pub fn minimum(&self) -> LogLevel {
        self.minimum
    }
}

impl LogFilter for MinimumLevelFilter {
    fn should_log(&self, event: &LogEvent) -> bool {
        event.level() >= self.minimum
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_is_inclusive() {
        let filter = MinimumLevelFilter::new(LogLevel::Warn);

        for level in LogLevel::ALL {
            let event = LogEvent::new(level, "gated");
            assert_eq!(filter.should_log(&event), level >= LogLevel::Warn, "{}", level);
        }
    }
}
