use rusqlite::{Connection, Result};

/// Initialise knowledge tables. Safe to call on every startup (idempotent).
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS knowledge_document (
            id           INTEGER PRIMARY KEY AUTOINCREMENT,
            content      TEXT NOT NULL,
            vector       BLOB NOT NULL,
            source       TEXT NOT NULL,
            category     TEXT NOT NULL,
            tags         TEXT NOT NULL DEFAULT '[]',
            created_at   TEXT NOT NULL,
            content_hash TEXT NOT NULL UNIQUE
        );
        CREATE INDEX IF NOT EXISTS idx_knowledge_created
            ON knowledge_document(created_at DESC);
        CREATE INDEX IF NOT EXISTS idx_knowledge_category
            ON knowledge_document(category, created_at DESC);",
    )
}
