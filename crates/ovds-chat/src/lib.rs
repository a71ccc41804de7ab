//! OVDS Chat - Message delivery tracking over versioned documents.
//!
//! A message is a versioned document like any other; what this crate adds is
//! the delivery-status lifecycle (SENDING -> SENT -> DELIVERED -> READ, with
//! FAILED off the happy path), enforced by an explicit transition table and
//! written through the versioning service with a status merge that never
//! regresses. Committed transitions fan out best-effort notifications to the
//! conversation's other participants, and a background scheduler resubmits
//! stuck or failed sends when the network is back.
//!
//! # Modules
//!
//! - [`message`] - Ids, delivery status, message and conversation models
//! - [`merge`] - Monotonic status merge strategy
//! - [`delivery`] - Transition table and the delivery state machine
//! - [`notify`] - Outbound notification channel boundary
//! - [`scheduler`] - Offline retry scheduler
//! - [`error`] - Error types

pub mod delivery;
pub mod error;
pub mod merge;
pub mod message;
pub mod notify;
pub mod scheduler;

// Re-exports for convenience
pub use delivery::{transition_allowed, DeliveryStateMachine};
pub use error::{ChatError, Result};
pub use merge::MonotonicStatusMerge;
pub use message::{Conversation, ConversationId, DeliveryStatus, Message, MessageId, UserId};
pub use notify::{
    MemoryNotificationChannel, NotificationChannel, NotificationError, StatusNotification,
};
pub use scheduler::{
    ConnectivityProbe, MemoryConnectivity, OfflineRetryScheduler, RetryReport,
    SchedulerConfig,
};
