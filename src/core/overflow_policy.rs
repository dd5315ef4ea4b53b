//! What to do with an event when the background buffer is full

use serde::{Deserialize, Serialize};
use std::fmt;

/// Policy for inserting into a full background buffer
///
/// The choice applies to every caller style: a blocking log call with
/// `Block` waits on the calling thread, an async log call with `Block`
/// suspends the calling task. `DropNewest` never waits.
///
/// # Example
///
/// ```
/// use logflow::OverflowPolicy;
///
/// // Default behavior: wait for space, never lose an event
/// assert_eq!(OverflowPolicy::default(), OverflowPolicy::Block);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OverflowPolicy {
    /// Wait until the consumer frees space (backpressure)
    #[default]
    Block,

    /// Discard the event that did not fit
    ///
    /// Drops are counted in the metrics and reported as diagnostics on the
    /// first drop and every 1000th after it.
    DropNewest,
}

impl fmt::Display for OverflowPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OverflowPolicy::Block => write!(f, "Block"),
            OverflowPolicy::DropNewest => write!(f, "DropNewest"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overflow_policy_default() {
        assert_eq!(OverflowPolicy::default(), OverflowPolicy::Block);
    }

    #[test]
    fn test_overflow_policy_display() {
        assert_eq!(OverflowPolicy::Block.to_string(), "Block");
        assert_eq!(OverflowPolicy::DropNewest.to_string(), "DropNewest");
    }
}
