//! Observability for the staking flow

pub mod metrics;

pub use metrics::{MetricsSnapshot, SettlementMetrics};
