//! Per-URL scrape tracking for change detection.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use chrono::{Duration, Utc};
use tracing::warn;

use crate::types::LinkTrackingEntry;

pub struct LinkTracker {
    entries: Mutex<HashMap<String, LinkTrackingEntry>>,
    path: PathBuf,
}

impl LinkTracker {
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match std::fs::read(&path) {
            Ok(bytes) => match serde_json::from_slice(&bytes) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "link tracker snapshot unreadable, starting empty");
                    HashMap::new()
                }
            },
            Err(_) => HashMap::new(),
        };
        Self {
            entries: Mutex::new(entries),
            path,
        }
    }

    pub fn get(&self, url: &str) -> Option<LinkTrackingEntry> {
        self.entries.lock().unwrap().get(url).cloned()
    }

    /// True when the URL was scraped within the staleness window and should
    /// be skipped without a fetch.
    pub fn is_fresh(&self, url: &str, stale_after: Duration) -> bool {
        self.get(url)
            .map(|e| Utc::now() - e.last_scraped < stale_after)
            .unwrap_or(false)
    }

    /// Record the hash of the content fetched from a URL just now.
    pub fn update(&self, url: &str, content_hash: &str) {
        let mut entries = self.entries.lock().unwrap();
        entries.insert(
            url.to_string(),
            LinkTrackingEntry {
                url: url.to_string(),
                last_scraped: Utc::now(),
                content_hash: content_hash.to_string(),
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Checkpoint to disk. Called at the end of each surf and by
    /// scheduler maintenance.
    pub fn save(&self) {
        let json = {
            let entries = self.entries.lock().unwrap();
            serde_json::to_vec_pretty(&*entries)
        };
        match json {
            Ok(bytes) => {
                if let Some(parent) = self.path.parent() {
                    let _ = std::fs::create_dir_all(parent);
                }
                if let Err(e) = std::fs::write(&self.path, bytes) {
                    warn!(path = %self.path.display(), error = %e, "link tracker write failed");
                }
            }
            Err(e) => warn!(error = %e, "link tracker serialization failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_window_respects_staleness() {
        let dir = tempfile::tempdir().unwrap();
        let t = LinkTracker::load(dir.path().join("link_tracker.json"));
        t.update("https://a.example/x", "abc");

        assert!(t.is_fresh("https://a.example/x", Duration::hours(24)));
        assert!(!t.is_fresh("https://a.example/x", Duration::zero()));
        assert!(!t.is_fresh("https://a.example/unknown", Duration::hours(24)));
    }

    #[test]
    fn save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("link_tracker.json");
        {
            let t = LinkTracker::load(&path);
            t.update("https://a.example/x", "abc");
            t.save();
        }
        let t = LinkTracker::load(&path);
        assert_eq!(t.get("https://a.example/x").unwrap().content_hash, "abc");
    }
}
