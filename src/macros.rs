//! Logging macros with `format!`-style arguments
//!
//! Each macro takes anything with a `log(level, message)` method as its
//! first argument: a [`LoggerEngine`](crate::LoggerEngine) or a reference
//! to one.
//!
//! # Examples
//!
//! ```
//! use logflow::prelude::*;
//! use logflow::info;
//!
//! let engine = LoggerEngine::new(LoggerConfig::default()).unwrap();
//!
//! info!(engine, "Server started");
//!
//! let port = 8080;
//! info!(engine, "Server listening on port {}", port);
//! ```

/// Log a message at an explicit level.
///
/// ```
/// # use logflow::prelude::*;
/// # let engine = LoggerEngine::new(LoggerConfig::default()).unwrap();
/// use logflow::log;
/// log!(engine, LogLevel::Info, "Simple message");
/// log!(engine, LogLevel::Error, "Error code: {}", 500);
/// ```
#[macro_export]
macro_rules! log {
    ($engine:expr, $level:expr, $($arg:tt)+) => {
        $engine.log($level, format!($($arg)+))
    };
}

#[macro_export]
macro_rules! trace {
    ($engine:expr, $($arg:tt)+) => {
        $crate::log!($engine, $crate::LogLevel::Trace, $($arg)+)
    };
}

#[macro_export]
macro_rules! debug {
    ($engine:expr, $($arg:tt)+) => {
        $crate::log!($engine, $crate::LogLevel::Debug, $($arg)+)
    };
}

#[macro_export]
macro_rules! info {
    ($engine:expr, $($arg:tt)+) => {
        $crate::log!($engine, $crate::LogLevel::Info, $($arg)+)
    };
}

/// Log a warning-level message.
///
/// ```
/// # use logflow::prelude::*;
/// # let engine = LoggerEngine::new(LoggerConfig::default()).unwrap();
/// use logflow::warn;
/// warn!(engine, "Retry attempt {} of {}", 3, 5);
/// ```
#[macro_export]
macro_rules! warn {
    ($engine:expr, $($arg:tt)+) => {
        $crate::log!($engine, $crate::LogLevel::Warn, $($arg)+)
    };
}

#[macro_export]
macro_rules! error {
    ($engine:expr, $($arg:tt)+) => {
        $crate::log!($engine, $crate::LogLevel::Error, $($arg)+)
    };
}

#[macro_export]
macro_rules! fatal {
    ($engine:expr, $($arg:tt)+) => {
        $crate::log!($engine, $crate::LogLevel::Fatal, $($arg)+)
    };
}
