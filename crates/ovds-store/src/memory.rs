//! In-memory document store for testing and simulation.

use crate::document::{DocPath, StoredDocument};
use crate::error::{Result, StoreError};
use crate::store::DocumentStore;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

/// In-memory implementation of [`DocumentStore`].
///
/// Commits enforce the same version precondition a real transactional store
/// would. Contention can be injected for exercising the retry protocol
/// without a second writer.
pub struct MemoryStore {
    // BTreeMap for deterministic iteration order in `list`.
    docs: RwLock<BTreeMap<DocPath, StoredDocument>>,
    forced_conflicts: AtomicU32,
    commit_attempts: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            docs: RwLock::new(BTreeMap::new()),
            forced_conflicts: AtomicU32::new(0),
            commit_attempts: AtomicU64::new(0),
        }
    }

    /// Make the next `n` commits fail with `TransactionConflict`, as if a
    /// concurrent writer won the race each time.
    pub fn inject_conflicts(&self, n: u32) {
        self.forced_conflicts.store(n, Ordering::SeqCst);
    }

    /// Total number of commit attempts observed, including injected failures.
    pub fn commit_attempts(&self) -> u64 {
        self.commit_attempts.load(Ordering::SeqCst)
    }

    /// Number of documents currently held.
    pub fn len(&self) -> usize {
        self.docs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.read().is_empty()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn read(&self, path: &DocPath) -> Result<Option<StoredDocument>> {
        Ok(self.docs.read().get(path).cloned())
    }

    async fn commit(
        &self,
        path: &DocPath,
        expected: Option<u64>,
        doc: StoredDocument,
    ) -> Result<()> {
        self.commit_attempts.fetch_add(1, Ordering::SeqCst);

        if self.forced_conflicts.load(Ordering::SeqCst) > 0 {
            self.forced_conflicts.fetch_sub(1, Ordering::SeqCst);
            return Err(StoreError::TransactionConflict(path.to_string()));
        }

        let mut docs = self.docs.write();
        let current = docs.get(path).map(|d| d.version);

        if current != expected {
            return Err(StoreError::TransactionConflict(path.to_string()));
        }

        docs.insert(path.clone(), doc);
        Ok(())
    }

    async fn list(&self, collection: &str) -> Result<Vec<(DocPath, StoredDocument)>> {
        let docs = self.docs.read();
        Ok(docs
            .iter()
            .filter(|(path, _)| path.collection == collection)
            .map(|(path, doc)| (path.clone(), doc.clone()))
            .collect())
    }
}
