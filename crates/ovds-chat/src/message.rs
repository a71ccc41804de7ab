//! Message and conversation models.

use crate::error::ChatError;
use chrono::{DateTime, Utc};
use ovds_store::{DocPath, Payload, StoredDocument, CONVERSATIONS, MESSAGES};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use ulid::Ulid;

/// Unique identifier for a user.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a conversation.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConversationId(pub String);

impl ConversationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a message.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MessageId(pub String);

impl MessageId {
    pub fn new() -> Self {
        Self(Ulid::new().to_string())
    }

    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Delivery lifecycle of a message.
///
/// Stored as an uppercase string; unrecognized strings fail document
/// parsing loudly instead of defaulting to a safe state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeliveryStatus {
    Sending,
    Sent,
    Delivered,
    Read,
    Failed,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Sending => "SENDING",
            DeliveryStatus::Sent => "SENT",
            DeliveryStatus::Delivered => "DELIVERED",
            DeliveryStatus::Read => "READ",
            DeliveryStatus::Failed => "FAILED",
        }
    }

    /// Position in the lifecycle, used by the monotonic merge.
    ///
    /// FAILED outranks SENT (a send can still fail after being written) but
    /// never outranks confirmed receipt.
    pub fn lifecycle_rank(&self) -> u8 {
        match self {
            DeliveryStatus::Sending => 0,
            DeliveryStatus::Sent => 1,
            DeliveryStatus::Failed => 2,
            DeliveryStatus::Delivered => 3,
            DeliveryStatus::Read => 4,
        }
    }

    /// The later of two statuses in lifecycle order.
    pub fn later(self, other: DeliveryStatus) -> DeliveryStatus {
        if other.lifecycle_rank() > self.lifecycle_rank() {
            other
        } else {
            self
        }
    }

    /// Parse a status from a stored JSON value, if it is a known string.
    pub fn from_value(value: &Value) -> Option<DeliveryStatus> {
        serde_json::from_value(value.clone()).ok()
    }
}

impl std::fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A chat message, stored as a versioned document in the `messages`
/// collection.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: MessageId,
    pub conversation_id: ConversationId,
    pub sender: UserId,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    pub delivery_status: DeliveryStatus,
    pub read_by: BTreeSet<UserId>,
    /// Store-side version counter; lives next to the payload, not in it.
    #[serde(skip)]
    pub version: u64,
}

impl Message {
    /// A freshly composed message, not yet confirmed by the store.
    pub fn new(conversation_id: ConversationId, sender: UserId, text: impl Into<String>) -> Self {
        Self {
            id: MessageId::new(),
            conversation_id,
            sender,
            text: text.into(),
            timestamp: Utc::now(),
            delivery_status: DeliveryStatus::Sending,
            read_by: BTreeSet::new(),
            version: 1,
        }
    }

    pub fn doc_path(&self) -> DocPath {
        DocPath::new(MESSAGES, self.id.0.clone())
    }

    pub fn to_payload(&self) -> Result<Payload, ChatError> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => unreachable!("a struct serializes to an object"),
            Err(err) => Err(ChatError::MalformedDocument {
                path: self.doc_path().to_string(),
                detail: err.to_string(),
            }),
        }
    }

    pub fn from_stored(path: &DocPath, doc: &StoredDocument) -> Result<Message, ChatError> {
        let mut message: Message = serde_json::from_value(Value::Object(doc.payload.clone()))
            .map_err(|err| ChatError::MalformedDocument {
                path: path.to_string(),
                detail: err.to_string(),
            })?;
        message.version = doc.version;
        Ok(message)
    }
}

/// A conversation document: the membership a delivery fan-out consults.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: ConversationId,
    pub participants: BTreeSet<UserId>,
    #[serde(skip)]
    pub version: u64,
}

impl Conversation {
    pub fn new(id: ConversationId, participants: impl IntoIterator<Item = UserId>) -> Self {
        Self {
            id,
            participants: participants.into_iter().collect(),
            version: 1,
        }
    }

    pub fn doc_path(&self) -> DocPath {
        Self::path_for(&self.id)
    }

    pub fn path_for(id: &ConversationId) -> DocPath {
        DocPath::new(CONVERSATIONS, id.0.clone())
    }

    /// Everyone in the conversation except `user`.
    pub fn others(&self, user: &UserId) -> Vec<UserId> {
        self.participants
            .iter()
            .filter(|p| *p != user)
            .cloned()
            .collect()
    }

    pub fn to_payload(&self) -> Result<Payload, ChatError> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => unreachable!("a struct serializes to an object"),
            Err(err) => Err(ChatError::MalformedDocument {
                path: self.doc_path().to_string(),
                detail: err.to_string(),
            }),
        }
    }

    pub fn from_stored(path: &DocPath, doc: &StoredDocument) -> Result<Conversation, ChatError> {
        let mut conversation: Conversation =
            serde_json::from_value(Value::Object(doc.payload.clone())).map_err(|err| {
                ChatError::MalformedDocument {
                    path: path.to_string(),
                    detail: err.to_string(),
                }
            })?;
        conversation.version = doc.version;
        Ok(conversation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_round_trip() {
        for status in [
            DeliveryStatus::Sending,
            DeliveryStatus::Sent,
            DeliveryStatus::Delivered,
            DeliveryStatus::Read,
            DeliveryStatus::Failed,
        ] {
            let value = serde_json::to_value(status).unwrap();
            assert_eq!(value, json!(status.as_str()));
            assert_eq!(DeliveryStatus::from_value(&value), Some(status));
        }
    }

    #[test]
    fn test_unknown_status_string_is_rejected() {
        assert_eq!(DeliveryStatus::from_value(&json!("PENDING")), None);
        assert_eq!(DeliveryStatus::from_value(&json!(3)), None);
    }

    #[test]
    fn test_lifecycle_order() {
        use DeliveryStatus::*;
        assert_eq!(Sending.later(Sent), Sent);
        assert_eq!(Sent.later(Failed), Failed);
        assert_eq!(Failed.later(Delivered), Delivered);
        assert_eq!(Read.later(Delivered), Read);
        assert_eq!(Read.later(Failed), Read);
    }

    #[test]
    fn test_message_payload_round_trip() {
        let message = Message::new(
            ConversationId::new("c1"),
            UserId::new("alice"),
            "are you home yet?",
        );
        let payload = message.to_payload().unwrap();
        assert_eq!(payload["deliveryStatus"], json!("SENDING"));
        assert!(!payload.contains_key("version"));

        let stored = StoredDocument::new(7, payload);
        let parsed = Message::from_stored(&message.doc_path(), &stored).unwrap();
        assert_eq!(parsed.id, message.id);
        assert_eq!(parsed.text, message.text);
        assert_eq!(parsed.version, 7);
    }

    #[test]
    fn test_malformed_status_fails_loudly() {
        let message = Message::new(ConversationId::new("c1"), UserId::new("alice"), "hi");
        let mut payload = message.to_payload().unwrap();
        payload.insert("deliveryStatus".to_string(), json!("PENDING"));

        let err =
            Message::from_stored(&message.doc_path(), &StoredDocument::new(1, payload)).unwrap_err();
        assert!(matches!(err, ChatError::MalformedDocument { .. }));
    }

    #[test]
    fn test_conversation_others() {
        let convo = Conversation::new(
            ConversationId::new("c1"),
            [UserId::new("alice"), UserId::new("bob"), UserId::new("eve")],
        );
        let others = convo.others(&UserId::new("bob"));
        assert_eq!(others, vec![UserId::new("alice"), UserId::new("eve")]);
    }
}
