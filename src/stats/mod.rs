//! Relay statistics

pub mod metrics;

pub use metrics::{ServerMetrics, ServerStats, SessionStats};
