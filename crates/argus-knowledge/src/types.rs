use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::rank;

/// A learned document with its embedding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeDocument {
    pub id: i64,
    pub content: String,
    pub source: String,
    pub category: String,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub content_hash: String,
    #[serde(skip)]
    pub vector: Vec<f32>,
}

/// One ranked search result.
#[derive(Debug, Clone)]
pub struct ScoredDocument {
    pub document: KnowledgeDocument,
    pub similarity: f32,
    pub relevance: f32,
}

/// Result set of a RAG search.
///
/// `expanded` is set when the 7-day window held no candidates and the
/// search fell back to all-time.
#[derive(Debug, Clone, Default)]
pub struct SearchOutcome {
    pub results: Vec<ScoredDocument>,
    pub expanded: bool,
}

impl SearchOutcome {
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Render results for prompt injection and inter-component signalling.
    ///
    /// The leading freshness glyph is load-bearing: the scheduler detects
    /// fresh content by scanning the formatted string for 🆕.
    pub fn format(&self) -> String {
        if self.results.is_empty() {
            return "No relevant knowledge found.".to_string();
        }
        let now = Utc::now();
        self.results
            .iter()
            .map(|r| {
                let age = now - r.document.created_at;
                format!(
                    "{} [{}] {} — {}\n{}",
                    rank::freshness_glyph(age),
                    r.document.category,
                    r.document.source,
                    r.document.created_at.format("%Y-%m-%d"),
                    r.document.content
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// Aggregate counters for the stats surface.
#[derive(Debug, Clone, Serialize)]
pub struct KnowledgeStats {
    pub total_documents: i64,
    pub by_category: Vec<(String, i64)>,
    pub newest: Option<DateTime<Utc>>,
    pub oldest: Option<DateTime<Utc>>,
}
