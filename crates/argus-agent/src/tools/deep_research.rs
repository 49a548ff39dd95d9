//! Focused browsing session as a tool of last resort: steer the browser at
//! the query, then read back what it just learned.

use std::sync::Arc;

use async_trait::async_trait;

use argus_browser::Browser;
use argus_knowledge::KnowledgeBase;

use super::{Tool, ToolResult};

pub struct DeepResearchTool {
    browser: Arc<Browser>,
    kb: Arc<KnowledgeBase>,
}

impl DeepResearchTool {
    pub fn new(browser: Arc<Browser>, kb: Arc<KnowledgeBase>) -> Self {
        Self { browser, kb }
    }
}

#[async_trait]
impl Tool for DeepResearchTool {
    fn name(&self) -> &str {
        "deep_research"
    }

    fn description(&self) -> &str {
        "Run a focused multi-page browsing session on a topic and return \
         what was learned. Slow and budget-limited; use only when \
         web_search and the knowledge base came up empty."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Topic to research"
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

        let report = match self.browser.surf(Some(&query)).await {
            Ok(report) => report,
            Err(e) => return ToolResult::error(format!("research session failed: {e}")),
        };

        let outcome = match self.kb.search(&query, 3, None).await {
            Ok(outcome) => outcome,
            Err(e) => return ToolResult::error(format!("knowledge search failed: {e}")),
        };

        if outcome.is_empty() {
            return ToolResult::success(format!(
                "Visited {} pages but found nothing substantial on \"{query}\".",
                report.visited.len()
            ));
        }
        ToolResult::success(format!(
            "Learned {} new document(s):\n\n{}",
            report.learned,
            outcome.format()
        ))
    }
}
