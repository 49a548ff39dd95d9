use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use argus_core::types::{MessageKind, UserId};

/// What a queued action delivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    /// Direct reply to an inbound message.
    Message,
    /// Unsolicited outbound message, subject to the per-user cooldown.
    Proactive,
    /// Media payload; content is a transport media reference.
    Media,
}

impl ActionKind {
    pub fn message_kind(self) -> MessageKind {
        match self {
            ActionKind::Media => MessageKind::Audio,
            _ => MessageKind::Text,
        }
    }
}

/// An action waiting in the queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueuedAction {
    pub id: String,
    pub kind: ActionKind,
    pub user_id: UserId,
    pub content: String,
    pub scheduled_for: DateTime<Utc>,
    /// 1 (lowest) to 10 (highest).
    pub priority: u8,
    pub retry_count: u32,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Parameters for [`crate::ActionQueue::enqueue`].
#[derive(Debug, Clone)]
pub struct EnqueueRequest {
    pub kind: ActionKind,
    pub user_id: UserId,
    pub content: String,
    /// Delay before the action becomes eligible.
    pub delay: Option<chrono::Duration>,
    pub priority: Option<u8>,
    pub metadata: Option<serde_json::Value>,
}

impl EnqueueRequest {
    pub fn new(kind: ActionKind, user_id: UserId, content: impl Into<String>) -> Self {
        Self {
            kind,
            user_id,
            content: content.into(),
            delay: None,
            priority: None,
            metadata: None,
        }
    }

    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn with_delay(mut self, delay: chrono::Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Queue counters for introspection.
#[derive(Debug, Clone, Default, Serialize)]
pub struct QueueStats {
    pub pending: usize,
    pub executed: u64,
    pub retried: u64,
    pub dropped: u64,
}
