//! Miscellaneous shared helpers (retry policies, crate-level errors).

pub mod error;
pub mod retry;

pub use error::FleetguardError;
pub use retry::{RetryHandle, RetryPolicy};
