//! Delivery-status state machine.

use crate::error::{ChatError, Result};
use crate::merge::MonotonicStatusMerge;
use crate::message::{Conversation, ConversationId, DeliveryStatus, Message, MessageId, UserId};
use crate::notify::{NotificationChannel, StatusNotification};
use chrono::Utc;
use ovds_store::{DocPath, DocumentStore, Payload, MESSAGES};
use ovds_sync::{SyncError, VersioningService};
use serde_json::json;
use std::sync::Arc;
use tracing::warn;

/// Whether a delivery-status move is in the allowed-transition table.
///
/// The happy path is SENDING -> SENT -> DELIVERED -> READ. A send may fail
/// until it is confirmed received; a failed message may be resubmitted.
/// Everything else, in particular any regression out of DELIVERED or READ,
/// is rejected.
pub fn transition_allowed(from: DeliveryStatus, to: DeliveryStatus) -> bool {
    use DeliveryStatus::*;
    match (from, to) {
        (Sending, Sent) => true,
        (Sent, Delivered) => true,
        (Sent, Read) => true,
        (Delivered, Read) => true,
        (Sending, Failed) => true,
        (Sent, Failed) => true,
        // Resubmission path out of FAILED.
        (Failed, Sending) => true,
        (Failed, Sent) => true,
        _ => false,
    }
}

/// Drives messages through the delivery lifecycle.
///
/// Every status write goes through the versioning service with the
/// monotonic status merge, so a concurrent advance on another device can
/// only ever move the status forward. After a committed transition the
/// conversation's other participants are notified on a detached task:
/// fan-out must complete even if the initiating caller is torn down, and
/// its failure never rolls back the transition.
pub struct DeliveryStateMachine<S: DocumentStore, N: NotificationChannel> {
    versioning: Arc<VersioningService<S>>,
    channel: Arc<N>,
}

impl<S: DocumentStore, N: NotificationChannel> DeliveryStateMachine<S, N> {
    pub fn new(versioning: Arc<VersioningService<S>>, channel: Arc<N>) -> Self {
        Self {
            versioning,
            channel,
        }
    }

    pub fn versioning(&self) -> &Arc<VersioningService<S>> {
        &self.versioning
    }

    pub fn channel(&self) -> &Arc<N> {
        &self.channel
    }

    /// Create the conversation document the fan-out consults.
    pub async fn create_conversation(&self, conversation: &Conversation) -> Result<()> {
        self.versioning
            .create(&conversation.doc_path(), conversation.to_payload()?)
            .await?;
        Ok(())
    }

    /// Compose and persist a new message, then confirm it as SENT.
    pub async fn send_message(
        &self,
        conversation_id: &ConversationId,
        sender: &UserId,
        text: impl Into<String>,
    ) -> Result<Message> {
        let message = Message::new(conversation_id.clone(), sender.clone(), text);
        self.versioning
            .create(&message.doc_path(), message.to_payload()?)
            .await?;

        // The store confirmed creation: SENDING -> SENT.
        self.advance(&message.id, sender, DeliveryStatus::Sent).await
    }

    /// A recipient's device confirms receipt.
    pub async fn mark_delivered(&self, message_id: &MessageId, actor: &UserId) -> Result<Message> {
        self.advance(message_id, actor, DeliveryStatus::Delivered)
            .await
    }

    /// A recipient read the message; they join `readBy` in the same write.
    pub async fn mark_read(&self, message_id: &MessageId, actor: &UserId) -> Result<Message> {
        let (path, message) = self.load(message_id).await?;

        if *actor == message.sender {
            self.reject(&path, ChatError::SenderCannotAcknowledge(DeliveryStatus::Read))?;
        }
        self.ensure_participant(&message.conversation_id, actor, &path)
            .await?;

        // Already READ: another recipient may still need to join the set,
        // which is a membership update, not a transition.
        if message.delivery_status == DeliveryStatus::Read {
            if message.read_by.contains(actor) {
                return Ok(message);
            }
            return self
                .commit_status(&path, &message, actor, DeliveryStatus::Read)
                .await;
        }

        if !transition_allowed(message.delivery_status, DeliveryStatus::Read) {
            self.reject(
                &path,
                ChatError::IllegalTransition {
                    from: message.delivery_status,
                    to: DeliveryStatus::Read,
                },
            )?;
        }

        self.commit_status(&path, &message, actor, DeliveryStatus::Read)
            .await
    }

    /// Record a transport-level failure of an outbound send.
    pub async fn mark_failed(&self, message_id: &MessageId, actor: &UserId) -> Result<Message> {
        self.advance(message_id, actor, DeliveryStatus::Failed).await
    }

    /// Resubmit a stuck or failed message through the send path.
    ///
    /// Idempotent: an already-delivered or read message is rejected by the
    /// transition table before anything is written or notified.
    pub async fn resend(&self, message_id: &MessageId, actor: &UserId) -> Result<Message> {
        self.advance(message_id, actor, DeliveryStatus::Sent).await
    }

    async fn advance(
        &self,
        message_id: &MessageId,
        actor: &UserId,
        to: DeliveryStatus,
    ) -> Result<Message> {
        let (path, message) = self.load(message_id).await?;

        if matches!(to, DeliveryStatus::Delivered | DeliveryStatus::Read) {
            if *actor == message.sender {
                self.reject(&path, ChatError::SenderCannotAcknowledge(to))?;
            }
            self.ensure_participant(&message.conversation_id, actor, &path)
                .await?;
        }

        if !transition_allowed(message.delivery_status, to) {
            self.reject(
                &path,
                ChatError::IllegalTransition {
                    from: message.delivery_status,
                    to,
                },
            )?;
        }

        self.commit_status(&path, &message, actor, to).await
    }

    async fn load(&self, message_id: &MessageId) -> Result<(DocPath, Message)> {
        let path = DocPath::new(MESSAGES, message_id.0.clone());
        let stored = self
            .versioning
            .store()
            .read(&path)
            .await
            .map_err(SyncError::from)?
            .ok_or_else(|| SyncError::DocumentNotFound(path.to_string()))?;
        let message = Message::from_stored(&path, &stored)?;
        Ok((path, message))
    }

    /// Report a rejected operation and return the error. Nothing is written.
    fn reject(&self, path: &DocPath, err: ChatError) -> Result<()> {
        self.versioning.monitor().operation_failed(path, err.to_string());
        Err(err)
    }

    /// Receipt acknowledgements must come from inside the conversation.
    async fn ensure_participant(
        &self,
        conversation_id: &ConversationId,
        actor: &UserId,
        message_path: &DocPath,
    ) -> Result<()> {
        let path = Conversation::path_for(conversation_id);
        let stored = self
            .versioning
            .store()
            .read(&path)
            .await
            .map_err(SyncError::from)?
            .ok_or_else(|| SyncError::DocumentNotFound(path.to_string()))?;
        let conversation = Conversation::from_stored(&path, &stored)?;

        if !conversation.participants.contains(actor) {
            self.reject(
                message_path,
                ChatError::NotParticipant {
                    user: actor.clone(),
                    conversation: conversation_id.clone(),
                },
            )?;
        }
        Ok(())
    }

    async fn commit_status(
        &self,
        path: &DocPath,
        message: &Message,
        actor: &UserId,
        to: DeliveryStatus,
    ) -> Result<Message> {
        let mut updates = Payload::new();
        updates.insert("deliveryStatus".to_string(), json!(to.as_str()));
        if to == DeliveryStatus::Read {
            let mut read_by = message.read_by.clone();
            read_by.insert(actor.clone());
            updates.insert("readBy".to_string(), json!(read_by));
        }

        let doc = self
            .versioning
            .update(path, updates, message.version, &MonotonicStatusMerge)
            .await?;
        let updated = Message::from_stored(path, &doc)?;

        self.spawn_notification(&updated, actor);
        Ok(updated)
    }

    /// Fan out the new status to the conversation's other participants.
    ///
    /// Runs detached from the caller: the transition has already committed,
    /// and the send must outlive a cancelled caller. Failures are logged,
    /// never retried here.
    fn spawn_notification(&self, message: &Message, actor: &UserId) {
        let versioning = self.versioning.clone();
        let channel = self.channel.clone();
        let actor = actor.clone();
        let conversation_id = message.conversation_id.clone();
        let notification = StatusNotification {
            message_id: message.id.clone(),
            conversation_id: conversation_id.clone(),
            new_status: message.delivery_status,
            timestamp: Utc::now(),
        };

        tokio::spawn(async move {
            let path = Conversation::path_for(&conversation_id);
            let recipients = match versioning.store().read(&path).await {
                Ok(Some(doc)) => match Conversation::from_stored(&path, &doc) {
                    Ok(conversation) => conversation.others(&actor),
                    Err(err) => {
                        warn!(%path, %err, "conversation unreadable, skipping fan-out");
                        return;
                    }
                },
                Ok(None) => {
                    warn!(%path, "conversation missing, skipping fan-out");
                    return;
                }
                Err(err) => {
                    warn!(%path, %err, "conversation lookup failed, skipping fan-out");
                    return;
                }
            };

            if recipients.is_empty() {
                return;
            }
            if let Err(err) = channel
                .send_status_notification(&recipients, notification)
                .await
            {
                warn!(%err, "status notification dropped");
            }
        });
    }
}
