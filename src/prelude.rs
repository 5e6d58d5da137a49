//! Convenience re-exports for downstream crates. Pull this module in via
//! `use fleetguard::prelude::*;` when wiring a protected sync loop.

pub use crate::clock::{Clock, SystemClock};
pub use crate::protection::{
    FetchOutcome, ProtectedFetcher, ProtectionConfig, RecordSource, SourceError,
};
pub use crate::reconcile::{ManagedObject, ReconcilePlan, StoreError, SyncLoop, TargetStore};
pub use crate::util::error::{FleetguardError, Result as FleetguardResult};
