//! Transient-fetch protection: a windowed count detector, a last-known-good
//! cache, and the orchestrator that decides which of the two a live fetch is
//! allowed to bypass.

mod cache;
mod config;
mod detector;
mod guard;
mod source;

pub use cache::{CacheHit, CacheStatus, RecordCache};
pub use config::{ConfigError, ProtectionConfig, ProtectionConfigFile};
pub use detector::{Classification, Snapshot, TransientDetector, TransientSignal};
pub use guard::{
    DegradeCause, DegradedFetch, FallbackSource, FetchOutcome, ProtectedFetcher, ProtectionError,
};
pub use source::{RecordSource, SourceError};
