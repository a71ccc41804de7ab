//! Error types for the store boundary.

use thiserror::Error;

/// Errors surfaced by the document store.
///
/// `TransactionConflict` is the only transient variant: it means another
/// writer committed between our read and our write, and the whole
/// read-resolve-write cycle may be retried.
#[derive(Error, Debug, Clone)]
pub enum StoreError {
    #[error("Document not found: {0}")]
    NotFound(String),

    #[error("Transaction conflict on {0}")]
    TransactionConflict(String),

    #[error("Store backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Whether the error is transient contention that a retry can resolve.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::TransactionConflict(_))
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
