//! Core library entrypoint for fleetguard, the transient-fetch protection
//! layer that sits between a fleet inventory poll and the reconciliation of
//! the credential objects derived from it.
//!
//! A poll that briefly returns fewer records than actually exist must never
//! cause still-valid objects to be pruned. [`ProtectedFetcher`] combines a
//! [`TransientDetector`] and a [`RecordCache`] to substitute the last trusted
//! record set when a live result looks suspect, and marks such results as
//! degraded so the [`reconcile`] layer can defer destructive work.

pub mod clock;
pub mod fleet;
pub mod observability;
pub mod prelude;
pub mod protection;
pub mod reconcile;
pub mod timeouts;
pub mod util;

pub use clock::{Clock, ManualClock, Sleep, SystemClock};
pub use fleet::{
    build_tenancy, connect_gateway_url, ClusterSecretSpec, FleetError, MembershipBindingName,
    MembershipName, Tenancy,
};
pub use observability::{MetricsSnapshot, ProtectionMetrics, SharedMetricsRegistry};
pub use protection::{
    CacheHit, CacheStatus, Classification, ConfigError, DegradeCause, DegradedFetch,
    FallbackSource, FetchOutcome, ProtectedFetcher, ProtectionConfig, ProtectionConfigFile,
    ProtectionError, RecordCache, RecordSource, Snapshot, SourceError, TransientDetector,
    TransientSignal,
};
pub use reconcile::{
    ManagedObject, PruneDisposition, ReconcileError, ReconcilePlan, ReconcileReport, StoreError,
    SyncLoop, TargetStore, MANAGED_BY_ANNOTATION,
};
pub use util::error::FleetguardError;
pub use util::retry::{RetryHandle, RetryPolicy};
