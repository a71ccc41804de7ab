//! Abstract store boundary.

use crate::document::{DocPath, StoredDocument};
use crate::error::Result;
use async_trait::async_trait;

/// Transactional document store boundary.
///
/// The external store executes the read and the subsequent write inside one
/// transaction; this trait renders that as a snapshot-CAS pair. `read`
/// observes the stored version (or absence), and `commit` carries that
/// observation as its precondition. A writer that raced in between makes the
/// commit fail with [`StoreError::TransactionConflict`], which callers treat
/// as transient and retry.
///
/// [`StoreError::TransactionConflict`]: crate::error::StoreError::TransactionConflict
#[async_trait]
pub trait DocumentStore: Send + Sync + 'static {
    /// Read the current state of a document, if it exists.
    async fn read(&self, path: &DocPath) -> Result<Option<StoredDocument>>;

    /// Commit a document, conditional on the version observed at read time.
    ///
    /// `expected` is the version the caller read in this cycle, or `None` if
    /// the document did not exist. The commit is all-or-nothing.
    async fn commit(
        &self,
        path: &DocPath,
        expected: Option<u64>,
        doc: StoredDocument,
    ) -> Result<()>;

    /// List every document in a collection, in stable path order.
    async fn list(&self, collection: &str) -> Result<Vec<(DocPath, StoredDocument)>>;
}
