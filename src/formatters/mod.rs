//! Formatter implementations

pub mod json;
pub mod plain_text;

pub use json::JsonFormatter;
pub use plain_text::PlainTextFormatter;
