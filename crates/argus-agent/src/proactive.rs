//! Unsolicited outbound synthesis: the per-discovery proactive decision
//! and the batched news digest.
//!
//! Both are sentinel-gated — the model answers `SKIP` / `NO_MATCHES` to
//! decline — and the digest additionally hard-gates on interests: a user
//! who never expressed any gets nothing, without an LLM call.

use tracing::debug;

use argus_core::types::UserId;

use crate::format;
use crate::orchestrator::Agent;

const SKIP_SENTINEL: &str = "SKIP";
const NO_MATCHES_SENTINEL: &str = "NO_MATCHES";
/// Most recent turns shown to the proactive decision.
const RECENT_TURNS: usize = 3;

impl Agent {
    /// Decide whether a freshly discovered item is worth pushing to this
    /// user right now. `None` means stay quiet.
    pub async fn generate_proactive_message(
        &self,
        user_id: &UserId,
        discovered: &str,
    ) -> Option<String> {
        let interests = self.deps.contexts.interests(user_id);
        let recent: Vec<String> = self
            .deps
            .contexts
            .history(user_id)
            .iter()
            .rev()
            .take(RECENT_TURNS)
            .rev()
            .map(|m| format!("{}: {}", m.role, m.content))
            .collect();

        let system = format!(
            "You just learned something while browsing. Decide whether it is \
             worth messaging this user about unprompted. Their interests: {:?}. \
             If it is not clearly relevant and timely, respond with exactly \
             {SKIP_SENTINEL}. Otherwise write one short, casual mobile message.",
            interests
        );
        let user = format!(
            "Recent conversation:\n{}\n\nDiscovered:\n{}",
            recent.join("\n"),
            discovered
        );

        let response = match self.deps.text_completer.complete(&system, &user).await {
            Ok(r) => r,
            Err(e) => {
                debug!(user_id = %user_id, error = %e, "proactive decision failed");
                return None;
            }
        };
        let trimmed = response.trim();
        if trimmed.is_empty() || trimmed == SKIP_SENTINEL {
            return None;
        }
        Some(format::postprocess(trimmed, self.word_cap))
    }

    /// Build a digest from a user's pending news batch.
    ///
    /// Hard-gated on interests: an empty set returns `None` before any LLM
    /// call, so interest-less users never receive digests.
    pub async fn generate_news_digest(
        &self,
        user_id: &UserId,
        items: &[String],
    ) -> Option<String> {
        let interests = self.deps.contexts.interests(user_id);
        if interests.is_empty() || items.is_empty() {
            return None;
        }

        let tags: Vec<&str> = interests.iter().map(String::as_str).collect();
        let system = format!(
            "You curate a tiny news digest for a chat user interested in {:?}. \
             From the items below: drop duplicates, pick at most 3 distinct \
             stories matching those interests, and write one sentence per \
             story. If nothing matches, respond with exactly {NO_MATCHES_SENTINEL}.",
            tags
        );
        let user = items.join("\n\n");

        let response = match self.deps.text_completer.complete(&system, &user).await {
            Ok(r) => r,
            Err(e) => {
                debug!(user_id = %user_id, error = %e, "digest generation failed");
                return None;
            }
        };
        let trimmed = response.trim();
        if trimmed.is_empty() || trimmed.contains(NO_MATCHES_SENTINEL) {
            return None;
        }
        Some(format::collapse_whitespace(&format::strip_think(trimmed)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::testutil::*;
    use argus_core::provider::{TextCompleter, ToolCompleter};
    use argus_core::types::MessageRole;
    use std::sync::atomic::Ordering;
    use std::sync::Arc;

    #[tokio::test]
    async fn empty_interests_skip_the_llm_entirely() {
        let dir = tempfile::tempdir().unwrap();
        let text = Arc::new(CannedText::new("a digest that must never be produced"));
        let agent = build_agent(
            &dir,
            Arc::clone(&text) as Arc<dyn TextCompleter>,
            Arc::new(ScriptedTools::new(vec![])) as Arc<dyn ToolCompleter>,
            Arc::new(NoPages),
        );
        let user = UserId::from("u2");
        agent.deps.contexts.append(&user, MessageRole::User, "hello");

        let digest = agent
            .generate_news_digest(&user, &["🆕 [tech] something".to_string()])
            .await;

        assert!(digest.is_none());
        assert_eq!(text.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn no_matches_sentinel_yields_none() {
        let dir = tempfile::tempdir().unwrap();
        let text = Arc::new(CannedText::new("NO_MATCHES"));
        let agent = build_agent(
            &dir,
            Arc::clone(&text) as Arc<dyn TextCompleter>,
            Arc::new(ScriptedTools::new(vec![])) as Arc<dyn ToolCompleter>,
            Arc::new(NoPages),
        );
        let user = UserId::from("u1");
        agent
            .deps
            .contexts
            .append(&user, MessageRole::User, "i love tech");

        let digest = agent
            .generate_news_digest(&user, &["🆕 [sports] cup final".to_string()])
            .await;
        assert!(digest.is_none());
    }

    #[tokio::test]
    async fn matching_digest_comes_through() {
        let dir = tempfile::tempdir().unwrap();
        let text = Arc::new(CannedText::new("New chips launched; benchmarks look wild."));
        let agent = build_agent(
            &dir,
            Arc::clone(&text) as Arc<dyn TextCompleter>,
            Arc::new(ScriptedTools::new(vec![])) as Arc<dyn ToolCompleter>,
            Arc::new(NoPages),
        );
        let user = UserId::from("u1");
        agent
            .deps
            .contexts
            .append(&user, MessageRole::User, "i love tech");

        let digest = agent
            .generate_news_digest(&user, &["🆕 [tech] chip story".to_string()])
            .await;
        assert_eq!(digest.as_deref(), Some("New chips launched; benchmarks look wild."));
    }

    #[tokio::test]
    async fn skip_sentinel_suppresses_proactive_message() {
        let dir = tempfile::tempdir().unwrap();
        let text = Arc::new(CannedText::new("SKIP"));
        let agent = build_agent(
            &dir,
            Arc::clone(&text) as Arc<dyn TextCompleter>,
            Arc::new(ScriptedTools::new(vec![])) as Arc<dyn ToolCompleter>,
            Arc::new(NoPages),
        );
        let user = UserId::from("u1");
        agent.deps.contexts.append(&user, MessageRole::User, "i love tech");

        let msg = agent
            .generate_proactive_message(&user, "fresh tech doc")
            .await;
        assert!(msg.is_none());
    }

    #[tokio::test]
    async fn proactive_message_is_word_capped() {
        let dir = tempfile::tempdir().unwrap();
        let long = "tech ".repeat(80);
        let text = Arc::new(CannedText::new(&long));
        let agent = build_agent(
            &dir,
            Arc::clone(&text) as Arc<dyn TextCompleter>,
            Arc::new(ScriptedTools::new(vec![])) as Arc<dyn ToolCompleter>,
            Arc::new(NoPages),
        );
        let user = UserId::from("u1");

        let msg = agent
            .generate_proactive_message(&user, "fresh tech doc")
            .await
            .unwrap();
        assert_eq!(msg.split_whitespace().count(), 50);
    }
}
