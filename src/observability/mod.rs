//! Metrics for the protection layer. Together with the `event=` log lines
//! these are the audit trail for why a cycle did or did not prune.

mod metrics;
mod registry;

pub use metrics::ProtectionMetrics;
pub use registry::{MetricsSnapshot, SharedMetricsRegistry};
