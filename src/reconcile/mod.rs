//! Reconciliation consumer: turns a protected fetch into create/update and
//! prune work against the target store, deferring prunes on degraded cycles.

mod plan;
mod store;
mod sync_loop;

pub use plan::{PruneDisposition, ReconcilePlan, ReconcileReport};
pub use store::{ManagedObject, StoreError, TargetStore, MANAGED_BY_ANNOTATION};
pub use sync_loop::SyncLoop;

use crate::protection::ProtectionError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error(transparent)]
    Protection(#[from] ProtectionError),
    #[error(transparent)]
    Store(#[from] StoreError),
}
