//! Filter implementations

pub mod minimum_level;
pub mod sampling;

pub use minimum_level::MinimumLevelFilter;
pub use sampling::SamplingFilter;
