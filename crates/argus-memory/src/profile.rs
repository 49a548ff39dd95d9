use std::sync::Mutex;

use rusqlite::Connection;

use argus_core::types::UserId;

use crate::db::init_db;
use crate::error::Result;
use crate::types::UserProfile;

/// Durable per-user profile facts, upserted as they surface in conversation.
pub struct UserProfileStore {
    db: Mutex<Connection>,
}

impl UserProfileStore {
    pub fn new(conn: Connection) -> Result<Self> {
        init_db(&conn)?;
        Ok(Self {
            db: Mutex::new(conn),
        })
    }

    pub fn get(&self, user_id: &UserId) -> Result<Option<UserProfile>> {
        let db = self.db.lock().unwrap();
        match db.query_row(
            "SELECT user_id, name, location, language, facts, last_asked
             FROM user_profile WHERE user_id = ?1",
            rusqlite::params![user_id.as_str()],
            row_to_profile,
        ) {
            Ok(p) => Ok(Some(p)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn upsert(&self, profile: &UserProfile) -> Result<()> {
        let facts = profile.facts.to_string();
        let last_asked = profile.last_asked.map(|t| t.to_rfc3339());
        let db = self.db.lock().unwrap();
        db.execute(
            "INSERT INTO user_profile (user_id, name, location, language, facts, last_asked)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(user_id) DO UPDATE SET
                 name = excluded.name,
                 location = excluded.location,
                 language = excluded.language,
                 facts = excluded.facts,
                 last_asked = excluded.last_asked",
            rusqlite::params![
                profile.user_id.as_str(),
                profile.name,
                profile.location,
                profile.language,
                facts,
                last_asked
            ],
        )?;
        Ok(())
    }
}

fn row_to_profile(row: &rusqlite::Row<'_>) -> rusqlite::Result<UserProfile> {
    let facts_str: String = row.get(4)?;
    let last_asked: Option<String> = row.get(5)?;
    Ok(UserProfile {
        user_id: UserId(row.get(0)?),
        name: row.get(1)?,
        location: row.get(2)?,
        language: row.get(3)?,
        facts: serde_json::from_str(&facts_str).unwrap_or(serde_json::Value::Null),
        last_asked: last_asked.and_then(|s| {
            chrono::DateTime::parse_from_rfc3339(&s)
                .map(|dt| dt.with_timezone(&chrono::Utc))
                .ok()
        }),
    })
}
