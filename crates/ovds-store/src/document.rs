//! Document identity and stored representation.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Collection holding conversation documents.
pub const CONVERSATIONS: &str = "conversations";

/// Collection holding message documents.
pub const MESSAGES: &str = "messages";

/// Fully qualified path of a document: `(collection, doc_id)`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DocPath {
    pub collection: String,
    pub doc_id: String,
}

impl DocPath {
    pub fn new(collection: impl Into<String>, doc_id: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            doc_id: doc_id.into(),
        }
    }
}

impl std::fmt::Display for DocPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.collection, self.doc_id)
    }
}

/// Document payload: a flat mapping of field names to JSON values.
pub type Payload = Map<String, Value>;

/// A document as held by the store: a version counter plus the payload.
///
/// Every committed write carries `version = version_read + 1`; the store
/// never interprets the payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StoredDocument {
    pub version: u64,
    pub payload: Payload,
}

impl StoredDocument {
    pub fn new(version: u64, payload: Payload) -> Self {
        Self { version, payload }
    }

    /// The representation of a document on first write.
    pub fn first(payload: Payload) -> Self {
        Self {
            version: 1,
            payload,
        }
    }
}
