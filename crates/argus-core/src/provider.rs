//! Capability interfaces for every external collaborator.
//!
//! The core never talks to an LLM, a search engine, a web page, or the
//! messaging transport directly. Each of those is injected as a trait object
//! wired up at startup, which keeps the dependency graph acyclic and lets
//! tests substitute deterministic fakes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::types::{MessageKind, UserId};

/// Error surface shared by all providers.
///
/// `Http` and `Timeout` are the transient kinds; callers retry or degrade.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Request timed out after {ms}ms")]
    Timeout { ms: u64 },

    #[error("Provider unavailable: {0}")]
    Unavailable(String),
}

impl ProviderError {
    /// Transient errors are worth retrying; the rest are not.
    pub fn is_transient(&self) -> bool {
        matches!(self, ProviderError::Http(_) | ProviderError::Timeout { .. })
    }
}

/// Plain text completion: one system prompt, one user prompt, one reply.
#[async_trait]
pub trait TextCompleter: Send + Sync {
    async fn complete(&self, system: &str, user: &str) -> Result<String, ProviderError>;
}

/// Tool definition sent to the LLM API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

/// A tool call extracted from the LLM response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub input: serde_json::Value,
}

/// Request for a completion that may call tools.
///
/// Messages are raw JSON content blocks so the tool loop can append
/// structured `tool_use` / `tool_result` turns that have no plain-string
/// representation.
#[derive(Debug, Clone)]
pub struct ToolChatRequest {
    pub system: String,
    pub messages: Vec<serde_json::Value>,
    pub tools: Vec<ToolDefinition>,
    pub max_tokens: u32,
}

/// Response from a tool-capable completion.
#[derive(Debug, Clone)]
pub struct ToolChatResponse {
    pub content: String,
    /// "tool_use" means the model wants tools executed; anything else ends
    /// the loop.
    pub stop_reason: String,
    pub tool_calls: Vec<ToolCall>,
}

#[async_trait]
pub trait ToolCompleter: Send + Sync {
    async fn complete_with_tools(
        &self,
        req: &ToolChatRequest,
    ) -> Result<ToolChatResponse, ProviderError>;
}

/// Dense embedding of a text snippet.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError>;
}

/// Image understanding for inbound photos.
#[async_trait]
pub trait VisionAnalyzer: Send + Sync {
    async fn analyze(&self, image: &[u8], mime_type: &str) -> Result<String, ProviderError>;
}

#[async_trait]
pub trait SpeechTranscriber: Send + Sync {
    async fn transcribe(&self, audio: &[u8], mime_type: &str) -> Result<String, ProviderError>;
}

#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>, ProviderError>;
}

/// One result from the external search provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>, ProviderError>;
}

/// Fetches a page and returns cleaned main-content text.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String, ProviderError>;
}

/// A candidate article link discovered on a hub page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArticleLink {
    pub url: String,
    pub title: String,
}

#[async_trait]
pub trait LinkExtractor: Send + Sync {
    async fn extract_links(&self, hub_url: &str) -> Result<Vec<ArticleLink>, ProviderError>;
}

/// Outbound delivery capability registered with the action queue.
///
/// For `MessageKind::Media` the content is a media reference previously
/// returned by [`MediaStore::upload`].
#[async_trait]
pub trait MessageSender: Send + Sync {
    async fn send(
        &self,
        user_id: &UserId,
        content: &str,
        kind: MessageKind,
    ) -> Result<(), ProviderError>;
}

/// Transport-side media download/upload adapter.
#[async_trait]
pub trait MediaStore: Send + Sync {
    async fn download(&self, media_id: &str) -> Result<Vec<u8>, ProviderError>;
    /// Uploads a payload and returns a transport media reference.
    async fn upload(&self, data: &[u8], mime_type: &str) -> Result<String, ProviderError>;
}
