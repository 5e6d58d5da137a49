use log::debug;
use parking_lot::RwLock;
use std::fmt;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
struct CachedRecordSet<R> {
    records: Vec<R>,
    stored_at: Instant,
}

/// A valid read from the cache.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheHit<R> {
    pub records: Vec<R>,
    pub age: Duration,
}

/// Last-known-good record set with an age-based validity window.
///
/// The held set is only ever replaced wholesale. Trust is decided by the
/// caller; the cache performs no validation of what it stores.
#[derive(Debug)]
pub struct RecordCache<R> {
    entry: RwLock<Option<CachedRecordSet<R>>>,
    max_age: Duration,
}

impl<R: Clone> RecordCache<R> {
    pub fn new(max_age: Duration) -> Self {
        Self {
            entry: RwLock::new(None),
            max_age,
        }
    }

    pub fn max_age(&self) -> Duration {
        self.max_age
    }

    pub fn store(&self, records: Vec<R>) {
        self.store_at(records, Instant::now());
    }

    pub fn store_at(&self, records: Vec<R>, now: Instant) {
        let len = records.len();
        *self.entry.write() = Some(CachedRecordSet {
            records,
            stored_at: now,
        });
        debug!("event=cache_store items={}", len);
    }

    pub fn fetch(&self) -> Option<CacheHit<R>> {
        self.fetch_at(Instant::now())
    }

    /// Returns the held set unless nothing was stored or it is older than
    /// `max_age`. A read at exactly `max_age` is still valid.
    pub fn fetch_at(&self, now: Instant) -> Option<CacheHit<R>> {
        let guard = self.entry.read();
        let entry = guard.as_ref()?;
        let age = now.saturating_duration_since(entry.stored_at);
        if age > self.max_age {
            return None;
        }
        debug!(
            "event=cache_read items={} age_ms={}",
            entry.records.len(),
            age.as_millis()
        );
        Some(CacheHit {
            records: entry.records.clone(),
            age,
        })
    }

    pub fn age(&self) -> Duration {
        self.age_at(Instant::now())
    }

    /// Zero when empty.
    pub fn age_at(&self, now: Instant) -> Duration {
        self.entry
            .read()
            .as_ref()
            .map(|entry| now.saturating_duration_since(entry.stored_at))
            .unwrap_or(Duration::ZERO)
    }

    pub fn status(&self) -> CacheStatus {
        self.status_at(Instant::now())
    }

    pub fn status_at(&self, now: Instant) -> CacheStatus {
        match self.entry.read().as_ref() {
            None => CacheStatus::Empty,
            Some(entry) => {
                let age = now.saturating_duration_since(entry.stored_at);
                CacheStatus::Populated {
                    items: entry.records.len(),
                    age,
                    expires_in: self.max_age.saturating_sub(age),
                }
            }
        }
    }
}

/// Diagnostic summary of a [`RecordCache`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Empty,
    Populated {
        items: usize,
        age: Duration,
        expires_in: Duration,
    },
}

impl fmt::Display for CacheStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheStatus::Empty => write!(f, "cache: empty"),
            CacheStatus::Populated {
                items,
                age,
                expires_in,
            } => write!(
                f,
                "cache: {items} items, age={age:?}, expires_in={expires_in:?}"
            ),
        }
    }
}
