//! Thin wrapper over the external search provider.

use std::sync::Arc;

use async_trait::async_trait;

use argus_core::provider::SearchProvider;

use super::{Tool, ToolResult};

const DEFAULT_RESULTS: usize = 3;
const MAX_RESULTS: usize = 5;

pub struct WebSearchTool {
    search: Arc<dyn SearchProvider>,
}

impl WebSearchTool {
    pub fn new(search: Arc<dyn SearchProvider>) -> Self {
        Self { search }
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Search the web for current information. Use for facts, prices, \
         schedules, or anything that changes over time."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Search query"
                },
                "num_results": {
                    "type": "integer",
                    "description": "How many results to return (max 5, default 3)"
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, input: serde_json::Value) -> ToolResult {
        let query = match input.get("query").and_then(|v| v.as_str()) {
            Some(q) if !q.trim().is_empty() => q.trim().to_string(),
            _ => return ToolResult::error("missing required parameter: query"),
        };
        let num = input
            .get("num_results")
            .and_then(|v| v.as_u64())
            .map(|n| (n as usize).min(MAX_RESULTS))
            .unwrap_or(DEFAULT_RESULTS);

        match self.search.search(&query, num).await {
            Ok(hits) if hits.is_empty() => {
                ToolResult::success(format!("No results found for: {query}"))
            }
            Ok(hits) => {
                let formatted: Vec<String> = hits
                    .iter()
                    .enumerate()
                    .map(|(i, h)| format!("{}. {} ({})\n{}", i + 1, h.title, h.url, h.snippet))
                    .collect();
                ToolResult::success(formatted.join("\n\n"))
            }
            Err(e) => ToolResult::error(format!("search failed: {e}")),
        }
    }
}
