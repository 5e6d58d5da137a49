use super::cache::RecordCache;
use super::config::{ConfigError, ProtectionConfig};
use super::detector::{Classification, TransientDetector};
use super::source::{RecordSource, SourceError};
use crate::clock::{Clock, SystemClock};
use crate::observability::{ProtectionMetrics, SharedMetricsRegistry};
use crate::util::retry::RetryPolicy;
use log::{info, warn};
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Where a degraded result's records came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackSource {
    /// Last trusted set, `age` old at the time it was served.
    Cache { age: Duration },
    /// The suspect live result itself; no valid cache existed.
    SuspectLive,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DegradeCause {
    Transient(Classification),
    UpstreamUnavailable { attempts: usize, error: SourceError },
}

impl DegradeCause {
    pub fn reason(&self) -> String {
        match self {
            DegradeCause::Transient(classification) => classification.reason(),
            DegradeCause::UpstreamUnavailable { attempts, error } => {
                format!("upstream unavailable after {attempts} attempts: {error}")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DegradedFetch<R> {
    pub records: Vec<R>,
    pub source: FallbackSource,
    pub cause: DegradeCause,
}

/// Result of one protected fetch. A degraded result is not an error, but its
/// consumer must not take destructive action on it.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome<R> {
    Trusted(Vec<R>),
    Degraded(DegradedFetch<R>),
}

impl<R> FetchOutcome<R> {
    pub fn records(&self) -> &[R] {
        match self {
            FetchOutcome::Trusted(records) => records,
            FetchOutcome::Degraded(degraded) => &degraded.records,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, FetchOutcome::Degraded(_))
    }

    pub fn degraded(&self) -> Option<&DegradedFetch<R>> {
        match self {
            FetchOutcome::Trusted(_) => None,
            FetchOutcome::Degraded(degraded) => Some(degraded),
        }
    }

    /// `(records, degraded)` as handed to the reconciliation consumer.
    pub fn into_parts(self) -> (Vec<R>, bool) {
        match self {
            FetchOutcome::Trusted(records) => (records, false),
            FetchOutcome::Degraded(degraded) => (degraded.records, true),
        }
    }
}

#[derive(Debug, Error)]
pub enum ProtectionError {
    #[error("stream {stream}: upstream failed after {attempts} attempts and no valid cache: {source}")]
    Upstream {
        stream: String,
        attempts: usize,
        #[source]
        source: SourceError,
    },
    #[error("stream {stream}: upstream fetch cancelled: {source}")]
    Cancelled {
        stream: String,
        #[source]
        source: SourceError,
    },
}

/// Wraps a raw [`RecordSource`] with bounded retries, transient detection and
/// last-known-good fallback.
///
/// The detector and cache are shared handles so diagnostics can inspect them
/// while cycles run. Neither lock is held across the upstream call.
pub struct ProtectedFetcher<S: RecordSource, C = SystemClock> {
    stream: String,
    source: S,
    clock: C,
    retry: RetryPolicy,
    detector: Arc<TransientDetector>,
    cache: Arc<RecordCache<S::Record>>,
    metrics: ProtectionMetrics,
}

impl<S: RecordSource> ProtectedFetcher<S, SystemClock> {
    /// Builds a fetcher from `config`, rejecting tunables outside their valid
    /// ranges.
    pub fn new(
        stream: impl Into<String>,
        source: S,
        config: &ProtectionConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let stream = stream.into();
        let metrics = ProtectionMetrics::new(SharedMetricsRegistry::new("fleetguard"), &stream);
        Ok(Self {
            stream,
            source,
            clock: SystemClock,
            retry: config.retry_policy(),
            detector: Arc::new(TransientDetector::new(
                config.detection_window(),
                config.oscillation_threshold(),
                config.drop_threshold(),
            )),
            cache: Arc::new(RecordCache::new(config.cache_max_age())),
            metrics,
        })
    }
}

impl<S: RecordSource, C: Clock> ProtectedFetcher<S, C> {
    pub fn with_clock<C2: Clock>(self, clock: C2) -> ProtectedFetcher<S, C2> {
        ProtectedFetcher {
            stream: self.stream,
            source: self.source,
            clock,
            retry: self.retry,
            detector: self.detector,
            cache: self.cache,
            metrics: self.metrics,
        }
    }

    pub fn with_metrics(mut self, registry: SharedMetricsRegistry) -> Self {
        self.metrics = ProtectionMetrics::new(registry, self.stream.clone());
        self
    }

    /// Replaces the detector and cache with externally owned instances.
    pub fn with_shared_state(
        mut self,
        detector: Arc<TransientDetector>,
        cache: Arc<RecordCache<S::Record>>,
    ) -> Self {
        self.detector = detector;
        self.cache = cache;
        self
    }

    pub fn stream(&self) -> &str {
        &self.stream
    }

    pub fn detector(&self) -> &Arc<TransientDetector> {
        &self.detector
    }

    pub fn cache(&self) -> &Arc<RecordCache<S::Record>> {
        &self.cache
    }

    pub fn metrics(&self) -> &ProtectionMetrics {
        &self.metrics
    }

    pub async fn fetch(&self) -> Result<FetchOutcome<S::Record>, ProtectionError> {
        let records = match self.fetch_with_retry().await {
            Ok(records) => records,
            Err((attempts, error)) => return self.fallback_after_failure(attempts, error),
        };

        let now = self.clock.now();
        let classification = self.detector.classify_at(records.len(), now);
        self.metrics
            .record_classification(records.len(), &classification);
        self.metrics.record_history_len(self.detector.len());

        if !classification.is_transient() {
            self.cache.store_at(records.clone(), now);
            self.metrics.record_cache_store();
            self.metrics.record_outcome(false);
            return Ok(FetchOutcome::Trusted(records));
        }

        let outcome = match self.cache.fetch_at(now) {
            Some(hit) if same_members(&hit.records, &records) => {
                info!(
                    "event=transient_confirmed_by_cache stream={} count={} reason=\"{}\"",
                    self.stream,
                    records.len(),
                    classification.reason()
                );
                self.metrics.record_cache_confirmation();
                self.cache.store_at(records.clone(), now);
                self.metrics.record_cache_store();
                FetchOutcome::Trusted(records)
            }
            Some(hit) => {
                warn!(
                    "event=cache_fallback stream={} live_count={} cached_count={} age_ms={} reason=\"{}\"",
                    self.stream,
                    records.len(),
                    hit.records.len(),
                    hit.age.as_millis(),
                    classification.reason()
                );
                self.metrics.record_cache_hit(hit.age);
                FetchOutcome::Degraded(DegradedFetch {
                    records: hit.records,
                    source: FallbackSource::Cache { age: hit.age },
                    cause: DegradeCause::Transient(classification),
                })
            }
            None => {
                self.metrics.record_cache_miss();
                warn!(
                    "event=suspect_live_served stream={} count={} cache=\"{}\" reason=\"{}\"",
                    self.stream,
                    records.len(),
                    self.cache.status_at(now),
                    classification.reason()
                );
                FetchOutcome::Degraded(DegradedFetch {
                    records,
                    source: FallbackSource::SuspectLive,
                    cause: DegradeCause::Transient(classification),
                })
            }
        };
        self.metrics.record_outcome(outcome.is_degraded());
        Ok(outcome)
    }

    async fn fetch_with_retry(&self) -> Result<Vec<S::Record>, (usize, SourceError)> {
        let mut handle = self.retry.handle();
        loop {
            self.metrics.record_attempt();
            let attempt = handle.attempts() + 1;
            match self.source.fetch().await {
                Ok(records) => {
                    if attempt > 1 {
                        info!(
                            "event=upstream_recovered stream={} attempt={} count={}",
                            self.stream,
                            attempt,
                            records.len()
                        );
                    }
                    return Ok(records);
                }
                Err(error) => {
                    self.metrics.record_upstream_failure();
                    if error.is_cancellation() {
                        return Err((attempt, error));
                    }
                    match handle.next_delay() {
                        Some(delay) => {
                            warn!(
                                "event=upstream_retry stream={} attempt={} delay_ms={} error={}",
                                self.stream,
                                attempt,
                                delay.as_millis(),
                                error
                            );
                            self.clock.sleep(delay).await;
                        }
                        None => {
                            warn!(
                                "event=upstream_exhausted stream={} attempts={} error={}",
                                self.stream, attempt, error
                            );
                            return Err((attempt, error));
                        }
                    }
                }
            }
        }
    }

    fn fallback_after_failure(
        &self,
        attempts: usize,
        error: SourceError,
    ) -> Result<FetchOutcome<S::Record>, ProtectionError> {
        if error.is_cancellation() {
            return Err(ProtectionError::Cancelled {
                stream: self.stream.clone(),
                source: error,
            });
        }
        let now = self.clock.now();
        match self.cache.fetch_at(now) {
            Some(hit) => {
                warn!(
                    "event=cache_fallback stream={} cached_count={} age_ms={} reason=\"upstream unavailable after {} attempts: {}\"",
                    self.stream,
                    hit.records.len(),
                    hit.age.as_millis(),
                    attempts,
                    error
                );
                self.metrics.record_cache_hit(hit.age);
                self.metrics.record_outcome(true);
                Ok(FetchOutcome::Degraded(DegradedFetch {
                    records: hit.records,
                    source: FallbackSource::Cache { age: hit.age },
                    cause: DegradeCause::UpstreamUnavailable { attempts, error },
                }))
            }
            None => {
                self.metrics.record_cache_miss();
                warn!(
                    "event=cache_miss stream={} cache=\"{}\" attempts={}",
                    self.stream,
                    self.cache.status_at(now),
                    attempts
                );
                Err(ProtectionError::Upstream {
                    stream: self.stream.clone(),
                    attempts,
                    source: error,
                })
            }
        }
    }
}

/// Order-insensitive equality that still counts duplicates.
fn same_members<R: Eq + Hash>(cached: &[R], live: &[R]) -> bool {
    if cached.len() != live.len() {
        return false;
    }
    let mut counts: HashMap<&R, usize> = HashMap::with_capacity(cached.len());
    for record in cached {
        *counts.entry(record).or_insert(0) += 1;
    }
    for record in live {
        match counts.get_mut(record) {
            Some(remaining) if *remaining > 0 => *remaining -= 1,
            _ => return false,
        }
    }
    true
}
