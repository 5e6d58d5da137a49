use std::future::Future;
use std::hash::Hash;
use std::time::Duration;
use thiserror::Error;

/// One upstream inventory poll. Implementations must be idempotent and free
/// of side effects; cancellation and timeouts are theirs to enforce and must
/// surface as [`SourceError::Cancelled`] or [`SourceError::DeadlineExceeded`].
pub trait RecordSource: Send + Sync {
    type Record: Clone + Eq + Hash + Send + Sync + 'static;

    fn fetch(&self) -> impl Future<Output = Result<Vec<Self::Record>, SourceError>> + Send;
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SourceError {
    #[error("upstream transport error: {0}")]
    Transport(String),
    #[error("upstream api error (status {status}): {message}")]
    Api { status: u16, message: String },
    #[error("upstream fetch cancelled")]
    Cancelled,
    #[error("upstream fetch exceeded deadline of {0:?}")]
    DeadlineExceeded(Duration),
}

impl SourceError {
    /// Cancellation and deadline errors are propagated, never retried.
    pub fn is_cancellation(&self) -> bool {
        matches!(
            self,
            SourceError::Cancelled | SourceError::DeadlineExceeded(_)
        )
    }
}
