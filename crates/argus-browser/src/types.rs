use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How a hub entered the favorites list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HubSource {
    Default,
    User,
    Discovered,
}

/// A root URL that article links are harvested from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FavoriteHub {
    pub url: String,
    pub category: String,
    pub last_visited: Option<DateTime<Utc>>,
    pub visit_count: u32,
    pub added_at: DateTime<Utc>,
    pub source: HubSource,
}

/// Change-detection record for a scraped URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkTrackingEntry {
    pub url: String,
    pub last_scraped: DateTime<Utc>,
    /// md5 of the article body we last fetched from this URL.
    pub content_hash: String,
}

/// Outcome of one surf session.
#[derive(Debug, Clone, Default)]
pub struct SurfReport {
    /// Article URLs actually fetched this session.
    pub visited: Vec<String>,
    /// Documents written to the knowledge base.
    pub learned: usize,
    /// Candidates skipped (stale, unchanged, duplicate, too short, failed).
    pub skipped: usize,
}
