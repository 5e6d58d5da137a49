use crate::fleet::ClusterSecretSpec;
use std::future::Future;
use thiserror::Error;

/// Annotation marking credential objects owned by this sync pipeline.
pub const MANAGED_BY_ANNOTATION: &str = "fleet.gke.io/managed-by-fleet-plugin";

/// An object currently present in the target store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagedObject {
    pub name: String,
    /// Whether the object carries [`MANAGED_BY_ANNOTATION`]. Unmarked
    /// objects are never pruned.
    pub managed: bool,
}

impl ManagedObject {
    pub fn managed(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            managed: true,
        }
    }

    pub fn foreign(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            managed: false,
        }
    }
}

/// Object store the derived credentials are reconciled into. Upserts must be
/// idempotent.
pub trait TargetStore: Send + Sync {
    fn list_objects(&self) -> impl Future<Output = Result<Vec<ManagedObject>, StoreError>> + Send;

    fn upsert(
        &self,
        object: &ClusterSecretSpec,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn delete(&self, name: &str) -> impl Future<Output = Result<(), StoreError>> + Send;
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("object {0} not found")]
    NotFound(String),
    #[error("conflict writing object {0}")]
    Conflict(String),
    #[error("target store error: {0}")]
    Backend(String),
}
