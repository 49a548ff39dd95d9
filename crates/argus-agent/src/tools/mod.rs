//! Tool system for the agentic loop.
//!
//! Tools are cheap per-request objects: the orchestrator builds the set
//! for each inbound message so user-scoped tools (history recall) carry
//! the right user without threading IDs through every call.

pub mod deep_research;
pub mod recall_history;
pub mod scrape_news;
pub mod tool_loop;
pub mod web_search;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use argus_core::provider::ToolDefinition;

/// Result of executing a tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    /// Text content returned to the LLM.
    pub content: String,
    /// Whether the tool execution failed.
    pub is_error: bool,
}

impl ToolResult {
    pub fn success(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: false,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            content: message.into(),
            is_error: true,
        }
    }
}

/// Trait that all tools implement.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique name for this tool (e.g. "web_search").
    fn name(&self) -> &str;
    /// Human-readable description of what this tool does.
    fn description(&self) -> &str;
    /// JSON Schema for the tool's input parameters.
    fn input_schema(&self) -> serde_json::Value;
    /// Execute the tool with the given input.
    async fn execute(&self, input: serde_json::Value) -> ToolResult;
}

/// Convert a slice of tools to API-level tool definitions.
pub fn to_definitions(tools: &[Box<dyn Tool>]) -> Vec<ToolDefinition> {
    tools
        .iter()
        .map(|t| ToolDefinition {
            name: t.name().to_string(),
            description: t.description().to_string(),
            input_schema: t.input_schema(),
        })
        .collect()
}
