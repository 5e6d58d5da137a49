use crate::fleet::FleetError;
use crate::protection::{ConfigError, ProtectionError};
use crate::reconcile::{ReconcileError, StoreError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FleetguardError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Protection(#[from] ProtectionError),
    #[error(transparent)]
    Fleet(#[from] FleetError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Reconcile(#[from] ReconcileError),
}

pub type Result<T, E = FleetguardError> = std::result::Result<T, E>;
