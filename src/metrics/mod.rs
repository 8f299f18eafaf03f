//! Aggregate statistics over profiled requests, shown on the panel index.

pub mod percentiles;
pub mod stats;

pub use percentiles::PercentileSet;
pub use stats::{RequestStats, StatsSnapshot};
