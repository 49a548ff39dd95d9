use rusqlite::{Connection, Result};

/// Initialise memory tables. Safe to call on every startup (idempotent).
pub fn init_db(conn: &Connection) -> Result<()> {
    create_summary_table(conn)?;
    create_history_table(conn)?;
    create_profile_table(conn)?;
    create_processed_table(conn)?;
    Ok(())
}

fn create_summary_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS conversation_summary (
            id           INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id      TEXT NOT NULL,
            summary      TEXT NOT NULL,
            created_at   TEXT NOT NULL,
            context_hash TEXT NOT NULL UNIQUE
        );
        CREATE INDEX IF NOT EXISTS idx_summary_user
            ON conversation_summary(user_id, created_at DESC);",
    )
}

fn create_history_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS history (
            id           INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id      TEXT NOT NULL,
            role         TEXT NOT NULL,
            content      TEXT NOT NULL,
            message_type TEXT NOT NULL DEFAULT 'text',
            created_at   TEXT NOT NULL,
            metadata     TEXT NOT NULL DEFAULT '{}'
        );
        CREATE INDEX IF NOT EXISTS idx_history_user
            ON history(user_id, created_at DESC);",
    )
}

fn create_profile_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS user_profile (
            user_id    TEXT PRIMARY KEY NOT NULL,
            name       TEXT,
            location   TEXT,
            language   TEXT,
            facts      TEXT NOT NULL DEFAULT '{}',
            last_asked TEXT
        );",
    )
}

/// Inbound replay markers. One row per transport message ID, set once.
fn create_processed_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS processed_message (
            message_id   TEXT PRIMARY KEY NOT NULL,
            processed_at TEXT NOT NULL,
            sender       TEXT NOT NULL,
            kind         TEXT NOT NULL
        );",
    )
}
