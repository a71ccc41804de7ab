//! Consistency event feed and diagnostic index.

use chrono::{DateTime, Utc};
use ovds_store::DocPath;
use parking_lot::RwLock;
use std::collections::HashMap;
use tokio::sync::broadcast;

/// Default capacity of the event feed.
const DEFAULT_CAPACITY: usize = 256;

/// Events describing the health of the versioning subsystem.
///
/// The stream is append-only and in-memory; consumers that want retention
/// persist it themselves.
#[derive(Clone, Debug)]
pub enum ConsistencyEvent {
    /// A document entered the versioning discipline (first write).
    DocumentTracked {
        path: DocPath,
        version: u64,
        at: DateTime<Utc>,
    },
    /// A versioned update committed.
    VersionUpdated {
        path: DocPath,
        version: u64,
        at: DateTime<Utc>,
    },
    /// An update attempt found a version mismatch and merged.
    ConflictDetected {
        path: DocPath,
        expected: u64,
        actual: u64,
        /// Version this monitor last saw for the document, if any.
        last_known: Option<u64>,
        at: DateTime<Utc>,
    },
    /// An operation failed and was not applied.
    OperationFailed {
        path: DocPath,
        reason: String,
        at: DateTime<Utc>,
    },
    /// Work was queued or skipped because the device is offline.
    OfflineOperation { detail: String, at: DateTime<Utc> },
    /// Background job activity (retry sweeps and the like).
    BackgroundOperation { detail: String, at: DateTime<Utc> },
}

/// Last observation of a document, kept only to annotate conflict events.
#[derive(Clone, Debug)]
pub struct DocumentWatch {
    pub version: u64,
    pub last_seen_at: DateTime<Utc>,
}

/// Pass-through broadcaster of [`ConsistencyEvent`]s.
///
/// Emission never blocks and never fails: the feed is a bounded broadcast
/// channel, and a subscriber that falls behind loses the oldest events
/// rather than applying backpressure. The only state kept here is a small
/// index of last-seen versions used to enrich conflict diagnostics.
pub struct ConsistencyMonitor {
    event_tx: broadcast::Sender<ConsistencyEvent>,
    monitored: RwLock<HashMap<DocPath, DocumentWatch>>,
}

impl ConsistencyMonitor {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (event_tx, _) = broadcast::channel(capacity);
        Self {
            event_tx,
            monitored: RwLock::new(HashMap::new()),
        }
    }

    /// Subscribe to the live event feed.
    pub fn subscribe(&self) -> broadcast::Receiver<ConsistencyEvent> {
        self.event_tx.subscribe()
    }

    /// Last-seen version of a document, if this monitor has observed one.
    pub fn last_known_version(&self, path: &DocPath) -> Option<u64> {
        self.monitored.read().get(path).map(|w| w.version)
    }

    pub fn document_tracked(&self, path: &DocPath, version: u64) {
        let at = Utc::now();
        self.note_version(path, version, at);
        self.emit(ConsistencyEvent::DocumentTracked {
            path: path.clone(),
            version,
            at,
        });
    }

    pub fn version_updated(&self, path: &DocPath, version: u64) {
        let at = Utc::now();
        self.note_version(path, version, at);
        self.emit(ConsistencyEvent::VersionUpdated {
            path: path.clone(),
            version,
            at,
        });
    }

    pub fn conflict_detected(&self, path: &DocPath, expected: u64, actual: u64) {
        let at = Utc::now();
        let last_known = self.last_known_version(path);
        self.note_version(path, actual, at);
        self.emit(ConsistencyEvent::ConflictDetected {
            path: path.clone(),
            expected,
            actual,
            last_known,
            at,
        });
    }

    pub fn operation_failed(&self, path: &DocPath, reason: impl Into<String>) {
        self.emit(ConsistencyEvent::OperationFailed {
            path: path.clone(),
            reason: reason.into(),
            at: Utc::now(),
        });
    }

    pub fn offline_operation(&self, detail: impl Into<String>) {
        self.emit(ConsistencyEvent::OfflineOperation {
            detail: detail.into(),
            at: Utc::now(),
        });
    }

    pub fn background_operation(&self, detail: impl Into<String>) {
        self.emit(ConsistencyEvent::BackgroundOperation {
            detail: detail.into(),
            at: Utc::now(),
        });
    }

    fn note_version(&self, path: &DocPath, version: u64, at: DateTime<Utc>) {
        self.monitored.write().insert(
            path.clone(),
            DocumentWatch {
                version,
                last_seen_at: at,
            },
        );
    }

    fn emit(&self, event: ConsistencyEvent) {
        // A send error just means nobody is subscribed right now.
        let _ = self.event_tx.send(event);
    }
}

impl Default for ConsistencyMonitor {
    fn default() -> Self {
        Self::new()
    }
}
