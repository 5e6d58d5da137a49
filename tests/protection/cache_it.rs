use fleetguard::RecordCache;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

fn bindings() -> Vec<String> {
    vec![
        "projects/123/locations/us-central1/memberships/cluster1/bindings/binding1".to_string(),
        "projects/123/locations/us-east4/memberships/cluster2/bindings/binding2".to_string(),
    ]
}

#[test]
fn store_then_fetch_returns_records() {
    let cache = RecordCache::new(Duration::from_secs(3600));
    let now = Instant::now();
    cache.store_at(bindings(), now);
    let hit = cache.fetch_at(now).expect("fresh cache");
    assert_eq!(hit.records, bindings());
    assert_eq!(hit.age, Duration::ZERO);
}

#[test]
fn empty_cache_is_invalid() {
    let cache: RecordCache<String> = RecordCache::new(Duration::from_secs(3600));
    assert!(cache.fetch().is_none());
    assert_eq!(cache.age(), Duration::ZERO);
}

#[test]
fn expired_entries_are_not_served() {
    let cache = RecordCache::new(Duration::from_millis(100));
    let now = Instant::now();
    cache.store_at(vec!["test-binding".to_string()], now);
    assert!(cache.fetch_at(now + Duration::from_millis(50)).is_some());
    assert!(cache.fetch_at(now + Duration::from_millis(150)).is_none());
    assert_eq!(
        cache.age_at(now + Duration::from_millis(150)),
        Duration::from_millis(150)
    );
}

#[test]
fn store_replaces_rather_than_merges() {
    let cache = RecordCache::new(Duration::from_secs(3600));
    let now = Instant::now();
    cache.store_at(bindings(), now);
    cache.store_at(vec!["only".to_string()], now + Duration::from_secs(5));
    let hit = cache
        .fetch_at(now + Duration::from_secs(6))
        .expect("valid");
    assert_eq!(hit.records, vec!["only".to_string()]);
    assert_eq!(hit.age, Duration::from_secs(1));
}

#[test]
fn storing_empty_set_is_valid() {
    let cache: RecordCache<String> = RecordCache::new(Duration::from_secs(60));
    let now = Instant::now();
    cache.store_at(Vec::new(), now);
    let hit = cache.fetch_at(now).expect("empty set is still a stored set");
    assert!(hit.records.is_empty());
}

#[test]
fn concurrent_readers_see_whole_sets() {
    let cache = Arc::new(RecordCache::new(Duration::from_secs(3600)));
    cache.store(vec![0u32; 4]);
    thread::scope(|scope| {
        for writer in 1..=4u32 {
            let cache = Arc::clone(&cache);
            scope.spawn(move || {
                for _ in 0..50 {
                    cache.store(vec![writer; 4]);
                }
            });
        }
        for _ in 0..4 {
            let cache = Arc::clone(&cache);
            scope.spawn(move || {
                for _ in 0..50 {
                    let hit = cache.fetch().expect("populated");
                    let first = hit.records[0];
                    assert!(hit.records.iter().all(|value| *value == first));
                }
            });
        }
    });
}
