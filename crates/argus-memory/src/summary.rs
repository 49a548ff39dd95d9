use std::sync::Mutex;

use md5::{Digest, Md5};
use rusqlite::Connection;
use tracing::debug;

use argus_core::provider::TextCompleter;
use argus_core::types::UserId;

use crate::db::init_db;
use crate::error::{MemoryError, Result};
use crate::types::{ConversationMessage, ConversationSummary};

/// Durable long-term summaries keyed by `(user, context hash)`.
///
/// The context hash makes archival idempotent: summarising the same window
/// twice inserts nothing the second time.
pub struct SummaryStore {
    db: Mutex<Connection>,
}

impl SummaryStore {
    pub fn new(conn: Connection) -> Result<Self> {
        init_db(&conn)?;
        Ok(Self {
            db: Mutex::new(conn),
        })
    }

    /// Insert a summary. A duplicate context hash yields
    /// [`MemoryError::DuplicateSummary`], which callers treat as a no-op.
    pub fn store(
        &self,
        user_id: &UserId,
        summary: &str,
        messages: &[ConversationMessage],
    ) -> Result<()> {
        let hash = context_hash(user_id, messages);
        let now = chrono::Utc::now().to_rfc3339();

        let db = self.db.lock().unwrap();
        match db.execute(
            "INSERT INTO conversation_summary (user_id, summary, created_at, context_hash)
             VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![user_id.as_str(), summary, now, hash],
        ) {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(MemoryError::DuplicateSummary { context_hash: hash })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Newest-first summaries for a user.
    pub fn recent(&self, user_id: &UserId, limit: usize) -> Result<Vec<String>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT summary FROM conversation_summary
             WHERE user_id = ?1
             ORDER BY created_at DESC, id DESC
             LIMIT ?2",
        )?;
        let rows = stmt.query_map(rusqlite::params![user_id.as_str(), limit as i64], |row| {
            row.get::<_, String>(0)
        })?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    /// Full records, newest-first. Used by maintenance and tests.
    pub fn recent_records(&self, user_id: &UserId, limit: usize) -> Result<Vec<ConversationSummary>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT user_id, summary, created_at, context_hash
             FROM conversation_summary
             WHERE user_id = ?1
             ORDER BY created_at DESC, id DESC
             LIMIT ?2",
        )?;
        let rows = stmt.query_map(rusqlite::params![user_id.as_str(), limit as i64], |row| {
            Ok(ConversationSummary {
                user_id: UserId(row.get(0)?),
                summary: row.get(1)?,
                created_at: parse_ts(row.get::<_, String>(2)?),
                context_hash: row.get(3)?,
            })
        })?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    /// Ask the LLM for a 3-bullet summary of the window, then store it.
    ///
    /// Windows shorter than 3 messages are not worth archiving. Any failure
    /// (LLM or duplicate) is swallowed; returns whether a row was written.
    pub async fn summarize_and_archive(
        &self,
        completer: &dyn TextCompleter,
        user_id: &UserId,
        messages: &[ConversationMessage],
    ) -> Result<bool> {
        if messages.len() < 3 {
            return Ok(false);
        }

        let encoded = encode_messages(messages);
        let system = "Summarize this conversation as exactly 3 short bullet points \
                      covering what the user asked about, what they revealed about \
                      themselves, and any follow-ups they expect.";
        let summary = match completer.complete(system, &encoded).await {
            Ok(s) if !s.trim().is_empty() => s,
            Ok(_) => return Ok(false),
            Err(e) => {
                debug!(user_id = %user_id, error = %e, "summarization failed, skipping archive");
                return Ok(false);
            }
        };

        match self.store(user_id, summary.trim(), messages) {
            Ok(()) => Ok(true),
            Err(MemoryError::DuplicateSummary { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Keep only the newest `max_per_user` summaries per user.
    /// Returns the number of rows deleted.
    pub fn enforce_retention(&self, max_per_user: usize) -> Result<usize> {
        let db = self.db.lock().unwrap();
        let deleted = db.execute(
            "DELETE FROM conversation_summary
             WHERE id NOT IN (
                 SELECT s.id FROM conversation_summary s
                 WHERE s.user_id = conversation_summary.user_id
                 ORDER BY s.created_at DESC, s.id DESC
                 LIMIT ?1
             )",
            rusqlite::params![max_per_user as i64],
        )?;
        Ok(deleted)
    }
}

/// md5 over `user_id` plus the canonical JSON encoding of the window.
pub fn context_hash(user_id: &UserId, messages: &[ConversationMessage]) -> String {
    let canonical = encode_messages(messages);
    let mut hasher = Md5::new();
    hasher.update(user_id.as_str().as_bytes());
    hasher.update(canonical.as_bytes());
    hex::encode(hasher.finalize())
}

/// Canonical encoding: role/content pairs only, so retries after clock
/// skew still hash identically.
fn encode_messages(messages: &[ConversationMessage]) -> String {
    let pairs: Vec<serde_json::Value> = messages
        .iter()
        .map(|m| serde_json::json!({ "role": m.role.to_string(), "content": m.content }))
        .collect();
    serde_json::to_string(&pairs).unwrap_or_default()
}

fn parse_ts(s: String) -> chrono::DateTime<chrono::Utc> {
    chrono::DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&chrono::Utc))
        .unwrap_or_else(|_| chrono::Utc::now())
}
