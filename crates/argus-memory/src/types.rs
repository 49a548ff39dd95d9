use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use argus_core::types::{MessageKind, MessageRole, UserId};

/// One turn in a user's short-term conversation window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub role: MessageRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// Per-user short-term state held by the [`crate::ContextStore`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationContext {
    pub user_id: UserId,
    pub messages: Vec<ConversationMessage>,
    pub last_interaction: DateTime<Utc>,
    /// Lowercase interest tags, merged by the fast extractor and replaced
    /// wholesale by the deep analysis.
    pub interests: BTreeSet<String>,
    /// User messages seen since the last deep interest analysis.
    pub msgs_since_analysis: u32,
}

impl ConversationContext {
    pub fn new(user_id: UserId, now: DateTime<Utc>) -> Self {
        Self {
            user_id,
            messages: Vec::new(),
            last_interaction: now,
            interests: BTreeSet::new(),
            msgs_since_analysis: 0,
        }
    }
}

/// Durable long-term summary of an expired conversation window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub user_id: UserId,
    pub summary: String,
    pub created_at: DateTime<Utc>,
    pub context_hash: String,
}

/// Append-only row in the message history log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: i64,
    pub user_id: UserId,
    pub role: MessageRole,
    pub content: String,
    pub kind: MessageKind,
    pub created_at: DateTime<Utc>,
    pub metadata: serde_json::Value,
}

/// Filters for [`crate::HistoryStore::query`]. All fields are optional
/// except `limit`; keywords are OR-matched against message content.
#[derive(Debug, Clone, Default)]
pub struct HistoryQuery {
    pub keywords: Vec<String>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub user_id: Option<UserId>,
    pub limit: usize,
}

/// Durable per-user profile, filled in opportunistically over time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: UserId,
    pub name: Option<String>,
    pub location: Option<String>,
    pub language: Option<String>,
    /// Free-form facts as a JSON object.
    pub facts: serde_json::Value,
    pub last_asked: Option<DateTime<Utc>>,
}
