use super::registry::{MetricsSnapshot, SharedMetricsRegistry};
use crate::protection::Classification;
use std::time::Duration;

/// Named metrics for one protected record stream. Every name is scoped as
/// `<namespace>.<stream>.<metric>`.
#[derive(Debug, Clone)]
pub struct ProtectionMetrics {
    registry: SharedMetricsRegistry,
    stream: String,
}

impl ProtectionMetrics {
    pub fn new(registry: SharedMetricsRegistry, stream: impl Into<String>) -> Self {
        Self {
            registry,
            stream: stream.into(),
        }
    }

    pub fn registry(&self) -> &SharedMetricsRegistry {
        &self.registry
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        self.registry.snapshot()
    }

    pub(crate) fn record_attempt(&self) {
        self.inc("fetch.attempts");
    }

    pub(crate) fn record_upstream_failure(&self) {
        self.inc("fetch.upstream_failures");
    }

    pub(crate) fn record_classification(&self, count: usize, classification: &Classification) {
        self.set("fetch.last_count", count as u64);
        if classification.is_transient() {
            self.inc("detector.transient");
        }
        if classification.has_oscillation() {
            self.inc("detector.oscillation");
        }
        if classification.has_sudden_drop() {
            self.inc("detector.sudden_drop");
        }
    }

    pub(crate) fn record_history_len(&self, len: usize) {
        self.set("detector.history_len", len as u64);
    }

    pub(crate) fn record_cache_hit(&self, age: Duration) {
        self.inc("cache.hits");
        self.set(
            "cache.age_ms",
            u64::try_from(age.as_millis()).unwrap_or(u64::MAX),
        );
    }

    /// A suspect live set matched the valid cache and was served as trusted.
    pub(crate) fn record_cache_confirmation(&self) {
        self.inc("detector.confirmed_by_cache");
    }

    pub(crate) fn record_cache_miss(&self) {
        self.inc("cache.misses");
    }

    pub(crate) fn record_cache_store(&self) {
        self.inc("cache.stores");
        self.set("cache.age_ms", 0);
    }

    pub(crate) fn record_outcome(&self, degraded: bool) {
        if degraded {
            self.inc("fetch.degraded");
        } else {
            self.inc("fetch.trusted");
        }
    }

    fn inc(&self, metric: &str) {
        self.registry
            .inc_counter(format!("{}.{}", self.stream, metric), 1);
    }

    fn set(&self, metric: &str, value: u64) {
        self.registry
            .set_gauge(format!("{}.{}", self.stream, metric), value);
    }
}
