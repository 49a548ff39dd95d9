use std::sync::Mutex;

use chrono::Utc;
use rusqlite::Connection;

use argus_core::types::MessageKind;

use crate::db::init_db;
use crate::error::Result;

/// Inbound replay guard. The transport redelivers on timeout, so every
/// message ID is recorded exactly once and duplicates are rejected early.
pub struct ProcessedMessages {
    db: Mutex<Connection>,
}

impl ProcessedMessages {
    pub fn new(conn: Connection) -> Result<Self> {
        init_db(&conn)?;
        Ok(Self {
            db: Mutex::new(conn),
        })
    }

    /// Record a message ID. Returns `true` when this is the first time the
    /// ID is seen, `false` on replay.
    pub fn mark(&self, message_id: &str, sender: &str, kind: MessageKind) -> Result<bool> {
        let now = Utc::now().to_rfc3339();
        let db = self.db.lock().unwrap();
        let inserted = db.execute(
            "INSERT OR IGNORE INTO processed_message (message_id, processed_at, sender, kind)
             VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![message_id, now, sender, kind.to_string()],
        )?;
        Ok(inserted == 1)
    }

    pub fn is_processed(&self, message_id: &str) -> Result<bool> {
        let db = self.db.lock().unwrap();
        let n: i64 = db.query_row(
            "SELECT COUNT(*) FROM processed_message WHERE message_id = ?1",
            rusqlite::params![message_id],
            |row| row.get(0),
        )?;
        Ok(n > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replay_is_rejected() {
        let p = ProcessedMessages::new(Connection::open_in_memory().unwrap()).unwrap();
        assert!(p.mark("m1", "u1", MessageKind::Text).unwrap());
        assert!(!p.mark("m1", "u1", MessageKind::Text).unwrap());
        assert!(p.is_processed("m1").unwrap());
        assert!(!p.is_processed("m2").unwrap());
    }
}
