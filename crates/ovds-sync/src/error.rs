//! Error types for the versioning layer.

use ovds_store::StoreError;
use thiserror::Error;

/// Errors that can occur during a versioned update.
#[derive(Error, Debug, Clone)]
pub enum SyncError {
    /// Update target does not exist. Fatal for the current call, not retried.
    #[error("Document not found: {0}")]
    DocumentNotFound(String),

    /// Creation target already exists. Creation is not a merge point.
    #[error("Document already exists: {0}")]
    DocumentExists(String),

    /// Document disappeared mid-conflict-resolution. Fatal, not retried.
    #[error("Document vanished during conflict resolution: {0}")]
    DocumentVanished(String),

    /// All retries spent on transient contention.
    #[error("Concurrency retries exhausted after {attempts} attempts")]
    ConcurrencyExhausted {
        attempts: u32,
        #[source]
        last: StoreError,
    },

    /// Non-transient store failure.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Result type for versioning operations.
pub type Result<T> = std::result::Result<T, SyncError>;
