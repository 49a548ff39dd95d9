use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use rusqlite::Connection;
use tracing::{debug, info};

use argus_core::provider::Embedder;

use crate::db::init_db;
use crate::error::{KnowledgeError, Result};
use crate::rank;
use crate::types::{KnowledgeDocument, KnowledgeStats, ScoredDocument, SearchOutcome};

/// Stored content is clipped to this many characters.
const MAX_CONTENT_CHARS: usize = 2000;
/// Documents shorter than this are noise, not knowledge.
const MIN_CONTENT_CHARS: usize = 10;
/// Primary search window before falling back to all-time.
const SEARCH_WINDOW_DAYS: i64 = 7;

/// Vector store of learned documents.
///
/// Thread-safe: the SQLite connection sits behind a Mutex, and embedding
/// calls complete before the lock is taken so no await happens under it.
pub struct KnowledgeBase {
    db: Mutex<Connection>,
    embedder: Arc<dyn Embedder>,
    similarity_threshold: f32,
    freshness_boost_age_hours: i64,
}

impl KnowledgeBase {
    pub fn new(
        conn: Connection,
        embedder: Arc<dyn Embedder>,
        similarity_threshold: f32,
        freshness_boost_age_hours: i64,
    ) -> Result<Self> {
        init_db(&conn)?;
        Ok(Self {
            db: Mutex::new(conn),
            embedder,
            similarity_threshold,
            freshness_boost_age_hours,
        })
    }

    /// Learn a document. Rejects trivial content and anything whose hash is
    /// already stored, which makes learning idempotent across sources.
    pub async fn learn(
        &self,
        content: &str,
        source: &str,
        category: &str,
        tags: &[String],
        timestamp: DateTime<Utc>,
        content_hash: &str,
    ) -> Result<i64> {
        if content.len() < MIN_CONTENT_CHARS {
            return Err(KnowledgeError::ContentTooShort {
                len: content.len(),
            });
        }
        if self.has_content_hash(content_hash)? {
            return Err(KnowledgeError::DuplicateContent {
                hash: content_hash.to_string(),
            });
        }

        let clipped = clip_chars(content, MAX_CONTENT_CHARS);
        let vector = self.embedder.embed(&clipped).await?;
        let blob = rank::vector_to_blob(&vector);
        let tags_json = serde_json::to_string(tags).unwrap_or_else(|_| "[]".into());

        let db = self.db.lock().unwrap();
        let result = db.execute(
            "INSERT INTO knowledge_document
             (content, vector, source, category, tags, created_at, content_hash)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            rusqlite::params![
                clipped,
                blob,
                source,
                category,
                tags_json,
                timestamp.to_rfc3339(),
                content_hash
            ],
        );
        match result {
            Ok(_) => {
                let id = db.last_insert_rowid();
                info!(id, source, category, "document learned");
                Ok(id)
            }
            // Concurrent learner won the race; same outcome as the pre-check.
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(KnowledgeError::DuplicateContent {
                    hash: content_hash.to_string(),
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Recency-weighted RAG search.
    ///
    /// Candidates come from the last 7 days; when that window is empty the
    /// search expands to all-time and the outcome is flagged `expanded`.
    pub async fn search(
        &self,
        query: &str,
        limit: usize,
        category: Option<&str>,
    ) -> Result<SearchOutcome> {
        let query_vec = self.embedder.embed(query).await?;
        let now = Utc::now();
        let cutoff = now - Duration::days(SEARCH_WINDOW_DAYS);

        let mut expanded = false;
        let mut candidates = self.load_candidates(Some(cutoff), category)?;
        if candidates.is_empty() {
            expanded = true;
            candidates = self.load_candidates(None, category)?;
            debug!(query, "search window empty, expanded to all-time");
        }

        let mut results: Vec<ScoredDocument> = candidates
            .into_iter()
            .filter_map(|doc| {
                let similarity = rank::cosine(&query_vec, &doc.vector);
                if similarity < self.similarity_threshold {
                    return None;
                }
                let age = now - doc.created_at;
                let relevance =
                    rank::relevance(similarity, age, self.freshness_boost_age_hours, expanded);
                Some(ScoredDocument {
                    document: doc,
                    similarity,
                    relevance,
                })
            })
            .collect();

        results.sort_by(|a, b| {
            b.relevance
                .partial_cmp(&a.relevance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        results.truncate(limit);

        Ok(SearchOutcome { results, expanded })
    }

    pub fn has_content_hash(&self, hash: &str) -> Result<bool> {
        let db = self.db.lock().unwrap();
        let n: i64 = db.query_row(
            "SELECT COUNT(*) FROM knowledge_document WHERE content_hash = ?1",
            rusqlite::params![hash],
            |row| row.get(0),
        )?;
        Ok(n > 0)
    }

    pub fn recent_documents(&self, limit: usize) -> Result<Vec<KnowledgeDocument>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT id, content, vector, source, category, tags, created_at, content_hash
             FROM knowledge_document ORDER BY created_at DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(rusqlite::params![limit as i64], row_to_document)?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    pub fn by_category(&self, category: &str, limit: usize) -> Result<Vec<KnowledgeDocument>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT id, content, vector, source, category, tags, created_at, content_hash
             FROM knowledge_document WHERE category = ?1
             ORDER BY created_at DESC LIMIT ?2",
        )?;
        let rows = stmt.query_map(rusqlite::params![category, limit as i64], row_to_document)?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    /// Documents carrying any of the given tags, newest first.
    pub fn by_tags(&self, tags: &[String], limit: usize) -> Result<Vec<KnowledgeDocument>> {
        if tags.is_empty() {
            return Ok(Vec::new());
        }
        // Tags persist as a JSON array; match the quoted form of each tag.
        let db = self.db.lock().unwrap();
        let clauses: Vec<String> = (0..tags.len())
            .map(|i| format!("tags LIKE ?{}", i + 1))
            .collect();
        let sql = format!(
            "SELECT id, content, vector, source, category, tags, created_at, content_hash
             FROM knowledge_document WHERE {}
             ORDER BY created_at DESC LIMIT ?{}",
            clauses.join(" OR "),
            tags.len() + 1
        );
        let mut bound: Vec<Box<dyn rusqlite::ToSql>> = tags
            .iter()
            .map(|t| Box::new(format!("%\"{t}\"%")) as Box<dyn rusqlite::ToSql>)
            .collect();
        bound.push(Box::new(limit as i64));
        let params: Vec<&dyn rusqlite::ToSql> = bound.iter().map(|b| b.as_ref()).collect();

        let mut stmt = db.prepare(&sql)?;
        let rows = stmt.query_map(&params[..], row_to_document)?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    /// Plain substring search over stored content.
    pub fn search_content(&self, substr: &str, limit: usize) -> Result<Vec<KnowledgeDocument>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT id, content, vector, source, category, tags, created_at, content_hash
             FROM knowledge_document WHERE content LIKE ?1
             ORDER BY created_at DESC LIMIT ?2",
        )?;
        let pattern = format!("%{substr}%");
        let rows = stmt.query_map(rusqlite::params![pattern, limit as i64], row_to_document)?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    /// Delete documents older than `days`. Returns the count removed.
    pub fn cleanup_older_than(&self, days: i64) -> Result<usize> {
        let cutoff = (Utc::now() - Duration::days(days)).to_rfc3339();
        let db = self.db.lock().unwrap();
        let deleted = db.execute(
            "DELETE FROM knowledge_document WHERE created_at < ?1",
            rusqlite::params![cutoff],
        )?;
        if deleted > 0 {
            info!(deleted, days, "expired knowledge documents removed");
        }
        Ok(deleted)
    }

    pub fn stats(&self) -> Result<KnowledgeStats> {
        let db = self.db.lock().unwrap();
        let total: i64 =
            db.query_row("SELECT COUNT(*) FROM knowledge_document", [], |row| row.get(0))?;
        let mut stmt = db.prepare(
            "SELECT category, COUNT(*) FROM knowledge_document
             GROUP BY category ORDER BY COUNT(*) DESC",
        )?;
        let by_category = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?
            .filter_map(|r| r.ok())
            .collect();
        let newest: Option<String> =
            db.query_row("SELECT MAX(created_at) FROM knowledge_document", [], |row| {
                row.get(0)
            })?;
        let oldest: Option<String> =
            db.query_row("SELECT MIN(created_at) FROM knowledge_document", [], |row| {
                row.get(0)
            })?;
        Ok(KnowledgeStats {
            total_documents: total,
            by_category,
            newest: newest.and_then(parse_ts),
            oldest: oldest.and_then(parse_ts),
        })
    }

    fn load_candidates(
        &self,
        cutoff: Option<DateTime<Utc>>,
        category: Option<&str>,
    ) -> Result<Vec<KnowledgeDocument>> {
        let db = self.db.lock().unwrap();
        let mut sql = String::from(
            "SELECT id, content, vector, source, category, tags, created_at, content_hash
             FROM knowledge_document WHERE 1=1",
        );
        let mut bound: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();
        if let Some(cutoff) = cutoff {
            bound.push(Box::new(cutoff.to_rfc3339()));
            sql.push_str(&format!(" AND created_at > ?{}", bound.len()));
        }
        if let Some(category) = category {
            bound.push(Box::new(category.to_string()));
            sql.push_str(&format!(" AND category = ?{}", bound.len()));
        }
        let params: Vec<&dyn rusqlite::ToSql> = bound.iter().map(|b| b.as_ref()).collect();

        let mut stmt = db.prepare(&sql)?;
        let rows = stmt.query_map(&params[..], row_to_document)?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }
}

/// Clip on a char boundary; byte-slicing multi-byte text panics.
fn clip_chars(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

fn parse_ts(s: String) -> Option<DateTime<Utc>> {
    chrono::DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
}

fn row_to_document(row: &rusqlite::Row<'_>) -> rusqlite::Result<KnowledgeDocument> {
    let blob: Vec<u8> = row.get(2)?;
    let tags_str: String = row.get(5)?;
    let ts_str: String = row.get(6)?;
    Ok(KnowledgeDocument {
        id: row.get(0)?,
        content: row.get(1)?,
        vector: rank::blob_to_vector(&blob),
        source: row.get(3)?,
        category: row.get(4)?,
        tags: serde_json::from_str(&tags_str).unwrap_or_default(),
        created_at: chrono::DateTime::parse_from_rfc3339(&ts_str)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
        content_hash: row.get(7)?,
    })
}
