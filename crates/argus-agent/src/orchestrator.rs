//! The inbound message pipeline: context append, prompt assembly, the
//! bounded tool loop, salvage fallbacks, and reply post-processing.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use argus_browser::Browser;
use argus_core::config::{AgentConfig, PersonaConfig};
use argus_core::provider::{SearchProvider, TextCompleter, ToolCompleter};
use argus_core::types::{MessageKind, MessageRole, UserId};
use argus_knowledge::KnowledgeBase;
use argus_memory::{ContextStore, HistoryStore, SummaryStore, UserProfileStore};

use crate::error::Result;
use crate::format;
use crate::prompt::{self, PromptInputs};
use crate::tools::deep_research::DeepResearchTool;
use crate::tools::recall_history::RecallHistoryTool;
use crate::tools::scrape_news::{NewsCache, ScrapeNewsTool};
use crate::tools::tool_loop;
use crate::tools::web_search::WebSearchTool;
use crate::tools::Tool;

/// Deterministic reply for any pipeline failure. Inbound messages are never
/// silently dropped; worst case the user sees this.
pub const FALLBACK_REPLY: &str =
    "Sorry, I encountered an issue processing your message. Please try again in a moment.";

/// Everything the orchestrator talks to, injected at wiring time.
pub struct AgentDeps {
    pub contexts: Arc<ContextStore>,
    pub summaries: Arc<SummaryStore>,
    pub history: Arc<HistoryStore>,
    pub profiles: Arc<UserProfileStore>,
    pub kb: Arc<KnowledgeBase>,
    pub browser: Arc<Browser>,
    pub text_completer: Arc<dyn TextCompleter>,
    pub tool_completer: Arc<dyn ToolCompleter>,
    pub search: Arc<dyn SearchProvider>,
}

pub struct Agent {
    pub(crate) deps: AgentDeps,
    pub(crate) persona_name: String,
    pub(crate) max_tool_rounds: usize,
    pub(crate) word_cap: usize,
    news_cache: Arc<NewsCache>,
}

impl Agent {
    pub fn new(deps: AgentDeps, persona: &PersonaConfig, cfg: &AgentConfig) -> Self {
        Self {
            deps,
            persona_name: persona.name.clone(),
            max_tool_rounds: cfg.max_tool_rounds,
            word_cap: cfg.mobile_word_cap,
            news_cache: Arc::new(NewsCache::default()),
        }
    }

    /// Handle one inbound text message end to end and return the reply.
    ///
    /// Both the user message and the reply land in the short-term context
    /// and the durable history, whichever way the pipeline goes.
    pub async fn handle_user_message(&self, user_id: &UserId, text: &str) -> String {
        self.deps.contexts.append(user_id, MessageRole::User, text);
        if let Err(e) =
            self.deps
                .history
                .store(user_id, MessageRole::User, text, MessageKind::Text, None)
        {
            warn!(user_id = %user_id, error = %e, "failed to log inbound message");
        }

        let reply = match self.respond(user_id, text).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "agent pipeline failed");
                FALLBACK_REPLY.to_string()
            }
        };

        self.deps
            .contexts
            .append(user_id, MessageRole::Assistant, &reply);
        if let Err(e) =
            self.deps
                .history
                .store(user_id, MessageRole::Assistant, &reply, MessageKind::Text, None)
        {
            warn!(user_id = %user_id, error = %e, "failed to log reply");
        }
        reply
    }

    async fn respond(&self, user_id: &UserId, text: &str) -> Result<String> {
        let summaries = self.deps.summaries.recent(user_id, 3).unwrap_or_default();
        let profile = self.deps.profiles.get(user_id).ok().flatten();

        // RAG pre-fetch: seed the prompt so trivial questions skip the tools.
        let knowledge = match self.deps.kb.search(text, 3, None).await {
            Ok(outcome) if !outcome.is_empty() => Some(outcome.format()),
            Ok(_) => None,
            Err(e) => {
                warn!(error = %e, "knowledge pre-fetch failed");
                None
            }
        };

        let system = prompt::build_system_prompt(&PromptInputs {
            persona_name: &self.persona_name,
            now: Utc::now(),
            summaries: &summaries,
            profile: profile.as_ref(),
            knowledge: knowledge.as_deref(),
        });

        let messages: Vec<serde_json::Value> = self
            .deps
            .contexts
            .history(user_id)
            .iter()
            .filter(|m| m.role != MessageRole::System)
            .map(|m| serde_json::json!({ "role": m.role.to_string(), "content": m.content }))
            .collect();

        let tools = self.build_tools(user_id);
        let outcome = tool_loop::run_tool_loop(
            self.deps.tool_completer.as_ref(),
            &system,
            messages,
            &tools,
            self.max_tool_rounds,
        )
        .await?;

        let reply = match outcome.reply {
            Some(reply) if !reply.trim().is_empty() => reply,
            _ if !outcome.partial_results.is_empty() => {
                info!(
                    user_id = %user_id,
                    partials = outcome.partial_results.len(),
                    "tool budget exhausted, salvaging partial results"
                );
                self.salvage_reply(text, &outcome.partial_results).await
            }
            _ => self.no_results_reply(text).await,
        };
        Ok(format::postprocess(&reply, self.word_cap))
    }

    fn build_tools(&self, user_id: &UserId) -> Vec<Box<dyn Tool>> {
        vec![
            Box::new(WebSearchTool::new(Arc::clone(&self.deps.search))),
            Box::new(RecallHistoryTool::new(
                Arc::clone(&self.deps.history),
                user_id.clone(),
            )),
            Box::new(ScrapeNewsTool::new(
                Arc::clone(&self.deps.kb),
                Arc::clone(&self.news_cache),
            )),
            Box::new(DeepResearchTool::new(
                Arc::clone(&self.deps.browser),
                Arc::clone(&self.deps.kb),
            )),
        ]
    }

    /// Closing message when the round budget ran out mid-search.
    async fn salvage_reply(&self, question: &str, partials: &[String]) -> String {
        let system = "You hit your search limit before finishing. Write a short, \
                      friendly closing message that shares the most useful findings \
                      below and is upfront that the search was cut short.";
        let user = format!(
            "Question: {question}\n\nFindings so far:\n{}",
            partials.join("\n---\n")
        );
        match self.deps.text_completer.complete(system, &user).await {
            Ok(reply) if !reply.trim().is_empty() => reply,
            _ => format!(
                "I hit my search limit, but here's what I found so far: {}",
                partials.first().cloned().unwrap_or_default()
            ),
        }
    }

    /// Apology when the budget ran out with nothing to show.
    async fn no_results_reply(&self, question: &str) -> String {
        let system = "Your searches came up empty. Apologise briefly and suggest \
                      one way the user could rephrase or narrow the question.";
        match self.deps.text_completer.complete(system, question).await {
            Ok(reply) if !reply.trim().is_empty() => reply,
            _ => "I dug around but couldn't find anything solid on that. \
                  Could you try rephrasing or narrowing it down?"
                .to_string(),
        }
    }
}
