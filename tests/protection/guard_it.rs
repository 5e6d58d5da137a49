#[path = "../support/protection/scripted_source.rs"]
mod scripted_source;

use fleetguard::{
    Clock, ConfigError, DegradeCause, FallbackSource, FetchOutcome, ManualClock, ProtectedFetcher,
    ProtectionConfig, ProtectionError, RecordCache, SharedMetricsRegistry, SourceError,
    TransientDetector,
};
use scripted_source::{membership_names, ScriptedSource};
use std::sync::Arc;
use std::time::{Duration, Instant};

fn config() -> ProtectionConfig {
    ProtectionConfig::default()
        .with_max_retries(3)
        .with_retry_base_delay(Duration::from_millis(100))
}

fn fetcher(
    source: ScriptedSource,
    config: ProtectionConfig,
) -> (ProtectedFetcher<ScriptedSource, ManualClock>, ManualClock) {
    let clock = ManualClock::new(Instant::now());
    let fetcher = ProtectedFetcher::new("memberships", source, &config)
        .expect("valid config")
        .with_clock(clock.clone());
    (fetcher, clock)
}

fn transport_error() -> Result<Vec<String>, SourceError> {
    Err(SourceError::Transport("connection reset".into()))
}

#[tokio::test]
async fn trusted_fetch_refreshes_cache() {
    let (fetcher, clock) = fetcher(ScriptedSource::from_counts(&[3]), config());
    let outcome = fetcher.fetch().await.expect("fetch");
    assert_eq!(outcome, FetchOutcome::Trusted(membership_names(3)));
    let hit = fetcher.cache().fetch_at(clock.now()).expect("cached");
    assert_eq!(hit.records, membership_names(3));
}

#[tokio::test]
async fn retries_use_linear_backoff() {
    let source = ScriptedSource::new(vec![
        transport_error(),
        transport_error(),
        Ok(membership_names(2)),
    ]);
    let (fetcher, clock) = fetcher(source.clone(), config());
    let outcome = fetcher.fetch().await.expect("recovers");
    assert!(!outcome.is_degraded());
    assert_eq!(source.calls(), 3);
    assert_eq!(
        clock.sleeps(),
        vec![Duration::from_millis(100), Duration::from_millis(200)]
    );
}

#[tokio::test]
async fn exhausted_retries_fall_back_to_cache() {
    let source = ScriptedSource::from_counts(&[4]);
    let (fetcher, clock) = fetcher(source.clone(), config());
    fetcher.fetch().await.expect("seed cache");
    for _ in 0..4 {
        source.push(transport_error());
    }

    let outcome = fetcher.fetch().await.expect("served from cache");
    let degraded = outcome.degraded().expect("degraded");
    assert_eq!(degraded.records, membership_names(4));
    assert_eq!(
        degraded.source,
        FallbackSource::Cache {
            age: Duration::from_millis(600)
        }
    );
    match &degraded.cause {
        DegradeCause::UpstreamUnavailable { attempts, error } => {
            assert_eq!(*attempts, 4);
            assert!(matches!(error, SourceError::Transport(_)));
        }
        other => panic!("unexpected cause {other:?}"),
    }
    assert_eq!(source.calls(), 5);
    assert_eq!(clock.sleeps().len(), 3);
    // Failed polls never reach the detector.
    assert_eq!(fetcher.detector().history().len(), 1);
}

#[tokio::test]
async fn exhausted_retries_without_cache_fail() {
    let source = ScriptedSource::new(vec![transport_error()]);
    let (fetcher, _clock) = fetcher(source.clone(), config().with_max_retries(1));
    let err = fetcher.fetch().await.expect_err("nothing to serve");
    match err {
        ProtectionError::Upstream {
            stream, attempts, ..
        } => {
            assert_eq!(stream, "memberships");
            assert_eq!(attempts, 2);
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert_eq!(source.calls(), 2);
}

#[tokio::test]
async fn exhausted_retries_with_expired_cache_fail() {
    let source = ScriptedSource::from_counts(&[4]);
    let config = config().with_cache_max_age(Duration::from_secs(1));
    let (fetcher, clock) = fetcher(source.clone(), config);
    fetcher.fetch().await.expect("seed cache");
    clock.advance(Duration::from_secs(2));
    for _ in 0..4 {
        source.push(transport_error());
    }

    let err = fetcher.fetch().await.expect_err("expired cache is not served");
    match err {
        ProtectionError::Upstream { attempts, .. } => assert_eq!(attempts, 4),
        other => panic!("unexpected error {other:?}"),
    }
    assert!(fetcher.cache().fetch_at(clock.now()).is_none());
}

#[test]
fn invalid_config_is_rejected() {
    let source = ScriptedSource::from_counts(&[12]);
    let config = ProtectionConfig::default().with_drop_threshold(-1.0);
    assert!(matches!(
        ProtectedFetcher::new("memberships", source.clone(), &config),
        Err(ConfigError::DropThreshold(threshold)) if threshold == -1.0
    ));
    let config = ProtectionConfig::default().with_oscillation_threshold(0);
    assert!(matches!(
        ProtectedFetcher::new("memberships", source.clone(), &config),
        Err(ConfigError::OscillationThreshold)
    ));
    let config = ProtectionConfig::default().with_detection_window(Duration::ZERO);
    assert!(matches!(
        ProtectedFetcher::new("memberships", source, &config),
        Err(ConfigError::ZeroDuration("detection_window"))
    ));
}

#[tokio::test]
async fn cancellation_is_not_retried_or_masked() {
    let source = ScriptedSource::new(vec![Ok(membership_names(4)), Err(SourceError::Cancelled)]);
    let (fetcher, clock) = fetcher(source.clone(), config());
    fetcher.fetch().await.expect("seed cache");
    let err = fetcher.fetch().await.expect_err("cancelled");
    assert!(matches!(err, ProtectionError::Cancelled { .. }));
    assert_eq!(source.calls(), 2);
    assert!(clock.sleeps().is_empty());
}

#[tokio::test]
async fn deadline_exceeded_propagates() {
    let source = ScriptedSource::new(vec![Err(SourceError::DeadlineExceeded(
        Duration::from_secs(30),
    ))]);
    let (fetcher, _clock) = fetcher(source.clone(), config());
    let err = fetcher.fetch().await.expect_err("deadline");
    assert!(matches!(err, ProtectionError::Cancelled { .. }));
    assert_eq!(source.calls(), 1);
}

#[tokio::test]
async fn transient_drop_serves_cached_set() {
    let source = ScriptedSource::from_counts(&[12, 12, 12, 6]);
    let (fetcher, clock) = fetcher(source, config());
    for _ in 0..3 {
        let outcome = fetcher.fetch().await.expect("fetch");
        assert!(!outcome.is_degraded());
        clock.advance(Duration::from_secs(10));
    }
    let outcome = fetcher.fetch().await.expect("fetch");
    let degraded = outcome.degraded().expect("degraded");
    assert_eq!(degraded.records, membership_names(12));
    assert_eq!(
        degraded.source,
        FallbackSource::Cache {
            age: Duration::from_secs(10)
        }
    );
    match &degraded.cause {
        DegradeCause::Transient(classification) => {
            assert!(classification.has_sudden_drop());
            assert!(degraded.cause.reason().contains("50% decrease"));
        }
        other => panic!("unexpected cause {other:?}"),
    }
    // The suspect observation is still recorded.
    assert_eq!(fetcher.detector().history().len(), 4);
    // The cache still holds the trusted set.
    let hit = fetcher.cache().fetch_at(clock.now()).expect("cached");
    assert_eq!(hit.records.len(), 12);
}

#[tokio::test]
async fn transient_without_valid_cache_serves_live_as_degraded() {
    let source = ScriptedSource::from_counts(&[12, 12, 12, 6]);
    let config = config().with_cache_max_age(Duration::from_secs(1));
    let (fetcher, clock) = fetcher(source, config);
    for _ in 0..3 {
        fetcher.fetch().await.expect("fetch");
        clock.advance(Duration::from_secs(10));
    }
    let outcome = fetcher.fetch().await.expect("fetch");
    let degraded = outcome.degraded().expect("degraded");
    assert_eq!(degraded.source, FallbackSource::SuspectLive);
    assert_eq!(degraded.records, membership_names(6));
    let (records, is_degraded) = outcome.into_parts();
    assert_eq!(records.len(), 6);
    assert!(is_degraded);
}

#[tokio::test]
async fn transient_matching_cache_is_trusted() {
    let source = ScriptedSource::from_counts(&[12, 12, 12, 6, 12]);
    let (fetcher, clock) = fetcher(source, config());
    for _ in 0..4 {
        fetcher.fetch().await.expect("fetch");
        clock.advance(Duration::from_secs(10));
    }
    let counts = fetcher
        .detector()
        .history()
        .iter()
        .map(|snapshot| snapshot.count)
        .collect::<Vec<_>>();
    assert_eq!(counts, vec![12, 12, 12, 6]);

    let outcome = fetcher.fetch().await.expect("fetch");
    assert_eq!(outcome, FetchOutcome::Trusted(membership_names(12)));
    let hit = fetcher.cache().fetch_at(clock.now()).expect("refreshed");
    assert_eq!(hit.age, Duration::ZERO);
}

#[tokio::test]
async fn duplicate_counts_must_match_to_confirm_cache() {
    let names = |members: &[&str]| members.iter().map(|m| m.to_string()).collect::<Vec<_>>();
    let cached = names(&["x", "x", "y"]);
    let source = ScriptedSource::new(vec![
        Ok(cached.clone()),
        Ok(cached.clone()),
        Ok(cached.clone()),
        Ok(names(&["x", "y"])),
        Ok(names(&["x", "y", "y"])),
    ]);
    let (fetcher, clock) = fetcher(source, config());
    for _ in 0..3 {
        assert!(!fetcher.fetch().await.expect("fetch").is_degraded());
        clock.advance(Duration::from_secs(10));
    }
    let dropped = fetcher.fetch().await.expect("fetch");
    assert_eq!(dropped.degraded().expect("degraded").records, cached);
    clock.advance(Duration::from_secs(10));

    let outcome = fetcher.fetch().await.expect("fetch");
    let degraded = outcome.degraded().expect("same length, different members");
    assert_eq!(degraded.records, cached);
    assert!(matches!(degraded.source, FallbackSource::Cache { .. }));
    let hit = fetcher.cache().fetch_at(clock.now()).expect("cached");
    assert_eq!(hit.records, cached);
}

#[tokio::test]
async fn cache_confirmation_is_not_counted_as_cache_hit() {
    let registry = SharedMetricsRegistry::new("fleetguard");
    let source = ScriptedSource::from_counts(&[12, 12, 12, 6, 12]);
    let (fetcher, clock) = fetcher(source, config());
    let fetcher = fetcher.with_metrics(registry.clone());
    for _ in 0..5 {
        fetcher.fetch().await.expect("fetch");
        clock.advance(Duration::from_secs(10));
    }
    let snapshot = registry.snapshot();
    assert_eq!(snapshot.counter("fleetguard.memberships.cache.hits"), 1);
    assert_eq!(
        snapshot.counter("fleetguard.memberships.detector.confirmed_by_cache"),
        1
    );
    assert_eq!(snapshot.counter("fleetguard.memberships.fetch.trusted"), 4);
}

#[tokio::test]
async fn zero_retries_make_single_attempt() {
    let source = ScriptedSource::new(vec![transport_error()]);
    let (fetcher, clock) = fetcher(source.clone(), config().with_max_retries(0));
    assert!(fetcher.fetch().await.is_err());
    assert_eq!(source.calls(), 1);
    assert!(clock.sleeps().is_empty());
}

#[tokio::test]
async fn metrics_record_cache_and_detector_activity() {
    let registry = SharedMetricsRegistry::new("fleetguard");
    let source = ScriptedSource::from_counts(&[12, 12, 12, 6]);
    let (fetcher, clock) = fetcher(source, config());
    let fetcher = fetcher.with_metrics(registry.clone());
    for _ in 0..4 {
        fetcher.fetch().await.expect("fetch");
        clock.advance(Duration::from_secs(10));
    }
    let snapshot = registry.snapshot();
    assert_eq!(snapshot.counter("fleetguard.memberships.fetch.attempts"), 4);
    assert_eq!(snapshot.counter("fleetguard.memberships.fetch.trusted"), 3);
    assert_eq!(snapshot.counter("fleetguard.memberships.fetch.degraded"), 1);
    assert_eq!(snapshot.counter("fleetguard.memberships.cache.hits"), 1);
    assert_eq!(snapshot.counter("fleetguard.memberships.cache.stores"), 3);
    assert_eq!(
        snapshot.counter("fleetguard.memberships.detector.sudden_drop"),
        1
    );
    assert_eq!(
        snapshot.gauge("fleetguard.memberships.fetch.last_count"),
        Some(6)
    );
    assert_eq!(
        snapshot.gauge("fleetguard.memberships.detector.history_len"),
        Some(4)
    );
    let json = serde_json::to_value(&snapshot).expect("serialize");
    assert!(json["counters"].is_object());
}

#[tokio::test]
async fn shared_state_is_visible_to_owner() {
    let detector = Arc::new(TransientDetector::new(Duration::from_secs(600), 2, 0.3));
    let cache = Arc::new(RecordCache::new(Duration::from_secs(600)));
    let (fetcher, _clock) = fetcher(ScriptedSource::from_counts(&[5]), config());
    let fetcher = fetcher.with_shared_state(Arc::clone(&detector), Arc::clone(&cache));
    fetcher.fetch().await.expect("fetch");
    assert_eq!(detector.history().len(), 1);
    assert!(cache.status().to_string().starts_with("cache: 5 items"));
}
