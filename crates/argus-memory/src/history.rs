use std::sync::Mutex;

use chrono::Utc;
use rusqlite::{Connection, ToSql};

use argus_core::types::{MessageKind, MessageRole, UserId};

use crate::db::init_db;
use crate::error::Result;
use crate::types::{HistoryEntry, HistoryQuery};

/// Append-only long-term message log. Nothing here is ever updated.
pub struct HistoryStore {
    db: Mutex<Connection>,
}

impl HistoryStore {
    pub fn new(conn: Connection) -> Result<Self> {
        init_db(&conn)?;
        Ok(Self {
            db: Mutex::new(conn),
        })
    }

    pub fn store(
        &self,
        user_id: &UserId,
        role: MessageRole,
        content: &str,
        kind: MessageKind,
        metadata: Option<serde_json::Value>,
    ) -> Result<i64> {
        let now = Utc::now().to_rfc3339();
        let meta = metadata
            .map(|m| m.to_string())
            .unwrap_or_else(|| "{}".to_string());

        let db = self.db.lock().unwrap();
        db.execute(
            "INSERT INTO history (user_id, role, content, message_type, created_at, metadata)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![
                user_id.as_str(),
                role.to_string(),
                content,
                kind.to_string(),
                now,
                meta
            ],
        )?;
        Ok(db.last_insert_rowid())
    }

    /// Filtered query, newest first. Keywords are OR-matched substrings.
    pub fn query(&self, q: &HistoryQuery) -> Result<Vec<HistoryEntry>> {
        let mut sql = String::from(
            "SELECT id, user_id, role, content, message_type, created_at, metadata
             FROM history WHERE 1=1",
        );
        let mut bound: Vec<Box<dyn ToSql>> = Vec::new();

        if let Some(ref user_id) = q.user_id {
            bound.push(Box::new(user_id.as_str().to_string()));
            sql.push_str(&format!(" AND user_id = ?{}", bound.len()));
        }
        if let Some(since) = q.since {
            bound.push(Box::new(since.to_rfc3339()));
            sql.push_str(&format!(" AND created_at >= ?{}", bound.len()));
        }
        if let Some(until) = q.until {
            bound.push(Box::new(until.to_rfc3339()));
            sql.push_str(&format!(" AND created_at <= ?{}", bound.len()));
        }
        if !q.keywords.is_empty() {
            let mut clauses = Vec::new();
            for kw in &q.keywords {
                bound.push(Box::new(format!("%{kw}%")));
                clauses.push(format!("content LIKE ?{}", bound.len()));
            }
            sql.push_str(&format!(" AND ({})", clauses.join(" OR ")));
        }

        let limit = if q.limit == 0 { 50 } else { q.limit } as i64;
        bound.push(Box::new(limit));
        sql.push_str(&format!(" ORDER BY created_at DESC, id DESC LIMIT ?{}", bound.len()));

        let params: Vec<&dyn ToSql> = bound.iter().map(|b| b.as_ref()).collect();

        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(&sql)?;
        let rows = stmt.query_map(&params[..], row_to_entry)?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    /// Total rows, for stats and tests.
    pub fn count(&self, user_id: Option<&UserId>) -> Result<i64> {
        let db = self.db.lock().unwrap();
        let n = match user_id {
            Some(u) => db.query_row(
                "SELECT COUNT(*) FROM history WHERE user_id = ?1",
                rusqlite::params![u.as_str()],
                |row| row.get(0),
            )?,
            None => db.query_row("SELECT COUNT(*) FROM history", [], |row| row.get(0))?,
        };
        Ok(n)
    }
}

fn row_to_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<HistoryEntry> {
    use std::str::FromStr;
    let role_str: String = row.get(2)?;
    let kind_str: String = row.get(4)?;
    let ts_str: String = row.get(5)?;
    let meta_str: String = row.get(6)?;
    Ok(HistoryEntry {
        id: row.get(0)?,
        user_id: UserId(row.get(1)?),
        role: MessageRole::from_str(&role_str).unwrap_or(MessageRole::User),
        content: row.get(3)?,
        kind: MessageKind::from_str(&kind_str).unwrap_or(MessageKind::Text),
        created_at: chrono::DateTime::parse_from_rfc3339(&ts_str)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
        metadata: serde_json::from_str(&meta_str).unwrap_or(serde_json::Value::Null),
    })
}
