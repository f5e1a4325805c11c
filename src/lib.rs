pub mod aggregator;
pub mod formatters;
pub mod models;
pub mod ownership;
pub mod probe;
pub mod profiler;
pub mod snapshot;
pub mod status;
