use parking_lot::Mutex;
use serde::Serialize;
use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, HashMap};
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

const METRICS_SHARD_COUNT: usize = 8;

/// Counter and gauge registry safe to share across concurrent sync cycles.
/// Names are qualified with the registry namespace.
#[derive(Debug, Clone)]
pub struct SharedMetricsRegistry {
    prefix: Arc<String>,
    shards: Arc<Vec<Mutex<MetricsShard>>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub counters: BTreeMap<String, u64>,
    pub gauges: BTreeMap<String, u64>,
}

impl MetricsSnapshot {
    pub fn counter(&self, name: &str) -> u64 {
        self.counters.get(name).copied().unwrap_or(0)
    }

    pub fn gauge(&self, name: &str) -> Option<u64> {
        self.gauges.get(name).copied()
    }
}

#[derive(Debug, Default)]
struct MetricsShard {
    counters: HashMap<String, Arc<AtomicU64>>,
    gauges: HashMap<String, Arc<AtomicU64>>,
}

impl SharedMetricsRegistry {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self::with_shards(namespace, METRICS_SHARD_COUNT)
    }

    pub fn with_shards(namespace: impl Into<String>, shards: usize) -> Self {
        let raw = namespace.into();
        let prefix = if raw.ends_with('.') {
            raw
        } else {
            format!("{}.", raw)
        };
        let shard_vec: Vec<Mutex<MetricsShard>> = (0..shards.max(1))
            .map(|_| Mutex::new(MetricsShard::default()))
            .collect();
        Self {
            prefix: Arc::new(prefix),
            shards: Arc::new(shard_vec),
        }
    }

    pub fn inc_counter(&self, name: impl Into<String>, delta: u64) -> u64 {
        let key = self.qualify(name.into());
        let cell = self
            .shard_for(&key)
            .lock()
            .counters
            .entry(key)
            .or_insert_with(|| Arc::new(AtomicU64::new(0)))
            .clone();
        atomic_saturating_add(&cell, delta)
    }

    pub fn set_gauge(&self, name: impl Into<String>, value: u64) {
        let key = self.qualify(name.into());
        let cell = self
            .shard_for(&key)
            .lock()
            .gauges
            .entry(key)
            .or_insert_with(|| Arc::new(AtomicU64::new(0)))
            .clone();
        cell.store(value, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let mut snapshot = MetricsSnapshot::default();
        for shard in self.shards.iter() {
            let guard = shard.lock();
            for (name, cell) in guard.counters.iter() {
                snapshot
                    .counters
                    .insert(name.clone(), cell.load(Ordering::Relaxed));
            }
            for (name, cell) in guard.gauges.iter() {
                snapshot
                    .gauges
                    .insert(name.clone(), cell.load(Ordering::Relaxed));
            }
        }
        snapshot
    }

    fn shard_for(&self, key: &str) -> &Mutex<MetricsShard> {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        let idx = (hasher.finish() as usize) % self.shards.len();
        &self.shards[idx]
    }

    fn qualify(&self, name: String) -> String {
        if name.starts_with(self.prefix.as_str()) {
            name
        } else {
            format!("{}{}", self.prefix, name)
        }
    }
}

fn atomic_saturating_add(cell: &AtomicU64, delta: u64) -> u64 {
    let mut current = cell.load(Ordering::Relaxed);
    loop {
        let new_value = current.saturating_add(delta);
        match cell.compare_exchange(current, new_value, Ordering::Relaxed, Ordering::Relaxed) {
            Ok(_) => return new_value,
            Err(actual) => current = actual,
        }
    }
}
