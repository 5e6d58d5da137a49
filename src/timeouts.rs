//! Centralized interval and protection defaults.
//!
//! Keeping these values in one place makes it clear which parts of the sync
//! pipeline share timing behaviour and gives a single knob to turn when the
//! upstream inventory service needs gentler polling.

use std::time::Duration;

/// Period between inventory polls in the sync loop.
pub const DEFAULT_RECONCILE_INTERVAL: Duration = Duration::from_secs(10);

/// Retries after the first failed upstream fetch.
pub const DEFAULT_MAX_RETRIES: u32 = 3;
/// Base of the linear retry backoff.
pub const DEFAULT_RETRY_BASE_DELAY: Duration = Duration::from_secs(1);
/// How long a trusted record set may be served as a fallback.
pub const DEFAULT_CACHE_MAX_AGE: Duration = Duration::from_secs(60 * 60);
/// How far back the detector looks for count patterns.
pub const DEFAULT_DETECTION_WINDOW: Duration = Duration::from_secs(10 * 60);
/// Count changes within the window that mark the stream as unstable.
pub const DEFAULT_OSCILLATION_THRESHOLD: usize = 2;
/// Fractional decrease from the windowed average that marks a sudden drop.
pub const DEFAULT_DROP_THRESHOLD: f64 = 0.3;
