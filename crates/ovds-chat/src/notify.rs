//! Outbound status-notification boundary.

use crate::message::{ConversationId, DeliveryStatus, MessageId, UserId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;

/// Payload of a status notification sent to the other participants.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusNotification {
    pub message_id: MessageId,
    pub conversation_id: ConversationId,
    pub new_status: DeliveryStatus,
    pub timestamp: DateTime<Utc>,
}

/// Notification transport error. Logged, never propagated: the state
/// transition that triggered the send has already committed.
#[derive(Error, Debug, Clone)]
pub enum NotificationError {
    #[error("Notification delivery failed: {0}")]
    DeliveryFailed(String),
}

/// Fire-and-forget push channel to other devices.
///
/// Delivery is best-effort and at-most-once; no acknowledgement is awaited
/// before the local transition is considered complete.
#[async_trait]
pub trait NotificationChannel: Send + Sync + 'static {
    async fn send_status_notification(
        &self,
        recipients: &[UserId],
        notification: StatusNotification,
    ) -> Result<(), NotificationError>;
}

/// In-memory channel for testing and simulation; records everything sent.
pub struct MemoryNotificationChannel {
    sent: RwLock<Vec<(Vec<UserId>, StatusNotification)>>,
    failing: AtomicBool,
}

impl MemoryNotificationChannel {
    pub fn new() -> Self {
        Self {
            sent: RwLock::new(Vec::new()),
            failing: AtomicBool::new(false),
        }
    }

    /// Make every subsequent send fail, to exercise the swallow-and-log path.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Everything sent so far.
    pub fn sent(&self) -> Vec<(Vec<UserId>, StatusNotification)> {
        self.sent.read().clone()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.read().len()
    }
}

impl Default for MemoryNotificationChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NotificationChannel for MemoryNotificationChannel {
    async fn send_status_notification(
        &self,
        recipients: &[UserId],
        notification: StatusNotification,
    ) -> Result<(), NotificationError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(NotificationError::DeliveryFailed(
                "simulated transport failure".to_string(),
            ));
        }
        self.sent.write().push((recipients.to_vec(), notification));
        Ok(())
    }
}
