//! Versioned-update orchestrator.

use crate::error::{Result, SyncError};
use crate::monitor::ConsistencyMonitor;
use crate::retry::RetryPolicy;
use crate::strategy::{overlay, ConflictContext, ConflictResolver, MergeStrategy};
use ovds_store::{DocPath, DocumentStore, Payload, StoreError, StoredDocument};
use std::sync::Arc;
use tracing::{debug, warn};

/// Orchestrates optimistic-concurrency updates against a document store.
///
/// One logical update is a read-resolve-write cycle: read the stored
/// document, compare its version to what the caller last saw, merge on
/// mismatch, and commit with the version bumped by exactly one. Transient
/// contention restarts the whole cycle under the retry policy; everything
/// else surfaces immediately as a typed failure.
pub struct VersioningService<S: DocumentStore> {
    store: Arc<S>,
    monitor: Arc<ConsistencyMonitor>,
    policy: RetryPolicy,
}

impl<S: DocumentStore> VersioningService<S> {
    pub fn new(store: Arc<S>, monitor: Arc<ConsistencyMonitor>) -> Self {
        Self {
            store,
            monitor,
            policy: RetryPolicy::default(),
        }
    }

    pub fn with_policy(store: Arc<S>, monitor: Arc<ConsistencyMonitor>, policy: RetryPolicy) -> Self {
        Self {
            store,
            monitor,
            policy,
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn monitor(&self) -> &Arc<ConsistencyMonitor> {
        &self.monitor
    }

    /// Create a document with version 1.
    ///
    /// Creation is not a merge point: an existing document (or a lost
    /// creation race) fails fast with [`SyncError::DocumentExists`].
    pub async fn create(&self, path: &DocPath, initial: Payload) -> Result<StoredDocument> {
        if self.store.read(path).await?.is_some() {
            return Err(SyncError::DocumentExists(path.to_string()));
        }

        let doc = StoredDocument::first(initial);
        match self.store.commit(path, None, doc.clone()).await {
            Ok(()) => {
                self.monitor.document_tracked(path, doc.version);
                Ok(doc)
            }
            Err(StoreError::TransactionConflict(_)) => {
                Err(SyncError::DocumentExists(path.to_string()))
            }
            Err(err) => {
                self.monitor.operation_failed(path, err.to_string());
                Err(err.into())
            }
        }
    }

    /// Apply a partial update against the version the caller last observed.
    ///
    /// Matching versions overlay `updates` onto the stored payload. A
    /// mismatch hands the full stored payload to the strategy. Either way
    /// the committed version is `stored + 1`, so versions stay strictly
    /// increasing and gap-free per document.
    pub async fn update(
        &self,
        path: &DocPath,
        updates: Payload,
        expected_version: u64,
        strategy: &dyn MergeStrategy,
    ) -> Result<StoredDocument> {
        let mut last_conflict: Option<StoreError> = None;

        for attempt in 0..self.policy.max_attempts {
            let stored = match self.store.read(path).await {
                Ok(Some(doc)) => doc,
                Ok(None) => {
                    self.monitor.operation_failed(path, "document not found");
                    return Err(SyncError::DocumentNotFound(path.to_string()));
                }
                Err(err) if err.is_transient() => {
                    last_conflict = Some(err);
                    tokio::time::sleep(self.policy.delay(attempt)).await;
                    continue;
                }
                Err(err) => {
                    self.monitor.operation_failed(path, err.to_string());
                    return Err(err.into());
                }
            };

            let merged = if stored.version == expected_version {
                overlay(&stored.payload, &updates)
            } else {
                self.monitor
                    .conflict_detected(path, expected_version, stored.version);
                let ctx = ConflictContext {
                    path: path.clone(),
                    expected_version,
                    actual_version: stored.version,
                    local_update: updates.clone(),
                    remote_payload: Some(stored.payload.clone()),
                };
                ConflictResolver::resolve(&ctx, strategy)?
            };

            let next = StoredDocument::new(stored.version + 1, merged);
            match self.store.commit(path, Some(stored.version), next.clone()).await {
                Ok(()) => {
                    self.monitor.version_updated(path, next.version);
                    return Ok(next);
                }
                Err(err) if err.is_transient() => {
                    debug!(%path, attempt, "commit contention, backing off");
                    last_conflict = Some(err);
                    tokio::time::sleep(self.policy.delay(attempt)).await;
                }
                Err(err) => {
                    self.monitor.operation_failed(path, err.to_string());
                    return Err(err.into());
                }
            }
        }

        warn!(%path, attempts = self.policy.max_attempts, "update retries exhausted");
        self.monitor.operation_failed(path, "concurrency retries exhausted");
        Err(SyncError::ConcurrencyExhausted {
            attempts: self.policy.max_attempts,
            last: last_conflict
                .unwrap_or_else(|| StoreError::TransactionConflict(path.to_string())),
        })
    }
}
