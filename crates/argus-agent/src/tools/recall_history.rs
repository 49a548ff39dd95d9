//! Long-term history recall, scoped to the requesting user.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};

use argus_core::types::UserId;
use argus_memory::types::HistoryQuery;
use argus_memory::HistoryStore;

use super::{Tool, ToolResult};

const DEFAULT_DAYS_BACK: i64 = 7;
const RESULT_LIMIT: usize = 10;

pub struct RecallHistoryTool {
    history: Arc<HistoryStore>,
    user_id: UserId,
}

impl RecallHistoryTool {
    pub fn new(history: Arc<HistoryStore>, user_id: UserId) -> Self {
        Self { history, user_id }
    }
}

#[async_trait]
impl Tool for RecallHistoryTool {
    fn name(&self) -> &str {
        "recall_history"
    }

    fn description(&self) -> &str {
        "Search this user's past conversations. Use when they reference \
         something they told you before (\"that restaurant I mentioned\")."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Keywords to look for in past messages"
                },
                "days_back": {
                    "type": "integer",
                    "description": "How many days back to search (default 7)"
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
        let days_back = input
            .get("days_back")
            .and_then(|v| v.as_i64())
            .filter(|d| *d > 0)
            .unwrap_or(DEFAULT_DAYS_BACK);

        let keywords: Vec<String> = query.split_whitespace().map(str::to_string).collect();
        let result = self.history.query(&HistoryQuery {
            keywords,
            since: Some(Utc::now() - Duration::days(days_back)),
            until: None,
            user_id: Some(self.user_id.clone()),
            limit: RESULT_LIMIT,
        });

        match result {
            Ok(entries) if entries.is_empty() => ToolResult::success(format!(
                "No messages matching \"{query}\" in the last {days_back} days."
            )),
            Ok(entries) => {
                let formatted: Vec<String> = entries
                    .iter()
                    .map(|e| {
                        format!(
                            "[{}] {}: {}",
                            e.created_at.format("%Y-%m-%d %H:%M"),
                            e.role,
                            e.content
                        )
                    })
                    .collect();
                ToolResult::success(formatted.join("\n"))
            }
            Err(e) => ToolResult::error(format!("history query failed: {e}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use argus_core::types::{MessageKind, MessageRole};
    use rusqlite::Connection;

    #[tokio::test]
    async fn recall_is_scoped_to_the_requesting_user() {
        let history = Arc::new(HistoryStore::new(Connection::open_in_memory().unwrap()).unwrap());
        history
            .store(&UserId::from("u1"), MessageRole::User, "I love sushi", MessageKind::Text, None)
            .unwrap();
        history
            .store(&UserId::from("u2"), MessageRole::User, "sushi is bad", MessageKind::Text, None)
            .unwrap();

        let tool = RecallHistoryTool::new(Arc::clone(&history), UserId::from("u1"));
        let result = tool.execute(serde_json::json!({"query": "sushi"})).await;

        assert!(!result.is_error);
        assert!(result.content.contains("I love sushi"));
        assert!(!result.content.contains("sushi is bad"));
    }

    #[tokio::test]
    async fn missing_query_is_an_error() {
        let history = Arc::new(HistoryStore::new(Connection::open_in_memory().unwrap()).unwrap());
        let tool = RecallHistoryTool::new(history, UserId::from("u1"));
        assert!(tool.execute(serde_json::json!({})).await.is_error);
    }
}
