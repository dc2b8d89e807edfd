//! Error types surfaced by a sync run.

use thiserror::Error;

/// Errors a sync run can end with.
///
/// Classification never appears here: every cascade failure is recovered
/// inside the cascade and only shows up in the result's `reason`.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Store credentials are missing. Not retried.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The store rejected or never answered the create call.
    #[error("{0}")]
    Persistence(String),

    /// The surrounding request was cancelled before the item was stored.
    #[error("sync cancelled")]
    Cancelled,
}

impl SyncError {
    /// Whether the record should land in the retry queue.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Persistence(_) | Self::Cancelled)
    }
}

/// Result alias for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;
