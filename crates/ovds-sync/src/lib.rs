//! OVDS Sync - Optimistic-concurrency versioning for shared documents.
//!
//! Every mutation of a shared document goes through [`VersioningService`]:
//! read the current document, compare versions, merge on mismatch via a
//! pluggable [`MergeStrategy`], and commit with the version bumped by one.
//! Transient store contention is retried with exponential backoff; every
//! attempt outcome is reported to the [`ConsistencyMonitor`] event feed.
//!
//! # Modules
//!
//! - [`strategy`] - Merge strategies and the conflict resolver
//! - [`service`] - The versioned-update orchestrator
//! - [`retry`] - Retry policy and backoff schedule
//! - [`monitor`] - Consistency event feed and diagnostic index
//! - [`error`] - Error types

pub mod error;
pub mod monitor;
pub mod retry;
pub mod service;
pub mod strategy;

// Re-exports for convenience
pub use error::{Result, SyncError};
pub use monitor::{ConsistencyEvent, ConsistencyMonitor, DocumentWatch};
pub use retry::{RetryPolicy, RetryPolicyBuilder};
pub use service::VersioningService;
pub use strategy::{overlay, ConflictContext, ConflictResolver, FieldUnionMerge, MergeStrategy};
