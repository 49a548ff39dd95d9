//! Category news digests backed by the knowledge base, with a short cache
//! so repeated questions in one conversation don't re-query.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use argus_knowledge::KnowledgeBase;

use super::{Tool, ToolResult};

const CACHE_TTL_MINUTES: i64 = 10;
const HEADLINES_PER_DIGEST: usize = 5;
const HEADLINE_CHARS: usize = 200;

/// Per-category cache of rendered digests, shared across requests.
#[derive(Default)]
pub struct NewsCache {
    entries: Mutex<HashMap<String, (DateTime<Utc>, String)>>,
}

impl NewsCache {
    fn get(&self, category: &str) -> Option<String> {
        let entries = self.entries.lock().unwrap();
        let (cached_at, digest) = entries.get(category)?;
        if Utc::now() - *cached_at < Duration::minutes(CACHE_TTL_MINUTES) {
            Some(digest.clone())
        } else {
            None
        }
    }

    fn put(&self, category: &str, digest: String) {
        self.entries
            .lock()
            .unwrap()
            .insert(category.to_string(), (Utc::now(), digest));
    }
}

pub struct ScrapeNewsTool {
    kb: Arc<KnowledgeBase>,
    cache: Arc<NewsCache>,
}

impl ScrapeNewsTool {
    pub fn new(kb: Arc<KnowledgeBase>, cache: Arc<NewsCache>) -> Self {
        Self { kb, cache }
    }
}

/// The tool's public category names map onto knowledge base categories.
fn kb_category(tool_category: &str) -> Option<&'static str> {
    match tool_category {
        "general" | "world" => Some("news"),
        "tech" => Some("tech"),
        "business" => Some("finance"),
        "sports" => Some("sports"),
        _ => None,
    }
}

#[async_trait]
impl Tool for ScrapeNewsTool {
    fn name(&self) -> &str {
        "scrape_news"
    }

    fn description(&self) -> &str {
        "Get the latest news digest for a category from articles gathered \
         while browsing. Categories: general, tech, business, sports, world."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "category": {
                    "type": "string",
                    "enum": ["general", "tech", "business", "sports", "world"],
                    "description": "News category"
                }
            },
            "required": ["category"]
        })
    }

    async fn execute(&self, input: serde_json::Value) -> ToolResult {
        let category = match input.get("category").and_then(|v| v.as_str()) {
            Some(c) => c.to_string(),
            None => return ToolResult::error("missing required parameter: category"),
        };
        let Some(kb_cat) = kb_category(&category) else {
            return ToolResult::error(format!("unknown category: {category}"));
        };

        if let Some(cached) = self.cache.get(&category) {
            return ToolResult::success(cached);
        }

        let docs = match self.kb.by_category(kb_cat, HEADLINES_PER_DIGEST) {
            Ok(docs) => docs,
            Err(e) => return ToolResult::error(format!("knowledge query failed: {e}")),
        };
        if docs.is_empty() {
            return ToolResult::success(format!(
                "No {category} articles gathered yet. Try deep_research for a live look."
            ));
        }

        let digest: Vec<String> = docs
            .iter()
            .map(|d| {
                let headline: String = d.content.chars().take(HEADLINE_CHARS).collect();
                format!(
                    "- [{}] {} ({})",
                    d.created_at.format("%m-%d"),
                    headline.trim(),
                    d.source
                )
            })
            .collect();
        let digest = digest.join("\n");
        self.cache.put(&category, digest.clone());
        ToolResult::success(digest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_mapping() {
        assert_eq!(kb_category("general"), Some("news"));
        assert_eq!(kb_category("world"), Some("news"));
        assert_eq!(kb_category("business"), Some("finance"));
        assert_eq!(kb_category("weather"), None);
    }

    #[test]
    fn cache_expires_after_ttl() {
        let cache = NewsCache::default();
        cache.put("tech", "digest".into());
        assert_eq!(cache.get("tech").as_deref(), Some("digest"));

        cache
            .entries
            .lock()
            .unwrap()
            .insert("tech".into(), (Utc::now() - Duration::minutes(11), "stale".into()));
        assert!(cache.get("tech").is_none());
    }
}
