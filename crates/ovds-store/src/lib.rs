//! OVDS Store - Document store boundary for the versioning core.
//!
//! The external document database is treated as a transactional key-value
//! store: per-document atomic read-modify-write, nothing more. This crate
//! defines the shape the rest of the system depends on:
//!
//! - [`document`] - Document paths, payloads, and the stored representation
//! - [`store`] - The `DocumentStore` boundary trait
//! - [`memory`] - In-memory store for testing and simulation
//! - [`error`] - Error types

pub mod document;
pub mod error;
pub mod memory;
pub mod store;

// Re-exports for convenience
pub use document::{DocPath, Payload, StoredDocument, CONVERSATIONS, MESSAGES};
pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use store::DocumentStore;
