//! Error types for the delivery layer.

use crate::message::{ConversationId, DeliveryStatus, UserId};
use ovds_sync::SyncError;
use thiserror::Error;

/// Errors that can occur while advancing a message's delivery status.
#[derive(Error, Debug)]
pub enum ChatError {
    /// The requested move is not in the allowed-transition table.
    /// Rejected synchronously; never written to the store.
    #[error("Illegal delivery transition: {from} -> {to}")]
    IllegalTransition {
        from: DeliveryStatus,
        to: DeliveryStatus,
    },

    /// Only a participant other than the sender may acknowledge receipt.
    #[error("Sender may not mark their own message {0}")]
    SenderCannotAcknowledge(DeliveryStatus),

    /// Acknowledgement from a user who is not in the conversation.
    #[error("User {user} is not a participant of conversation {conversation}")]
    NotParticipant {
        user: UserId,
        conversation: ConversationId,
    },

    /// A stored document did not parse as a message or conversation.
    /// Unknown status strings fail here rather than defaulting.
    #[error("Malformed document at {path}: {detail}")]
    MalformedDocument { path: String, detail: String },

    /// Failure in the underlying versioned update.
    #[error(transparent)]
    Sync(#[from] SyncError),
}

/// Result type for delivery operations.
pub type Result<T> = std::result::Result<T, ChatError>;
