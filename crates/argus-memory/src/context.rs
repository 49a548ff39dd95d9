//! Short-term conversation memory: a per-user rolling window with TTL
//! filtering on read, inline fast interest tagging, fire-and-forget deep
//! analysis, and summarize-then-evict expiry.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};

use argus_core::provider::TextCompleter;
use argus_core::types::{MessageRole, UserId};

use crate::interest;
use crate::summary::SummaryStore;
use crate::types::{ConversationContext, ConversationMessage};

/// How many recent messages the deep analysis sees.
const DEEP_ANALYSIS_WINDOW: usize = 10;

pub struct ContextStore {
    contexts: Mutex<HashMap<UserId, ConversationContext>>,
    snapshot_path: PathBuf,
    ttl: Duration,
    analysis_interval: u32,
    /// Set during wiring; absent in most unit tests.
    deep_completer: Mutex<Option<Arc<dyn TextCompleter>>>,
}

impl ContextStore {
    /// Load the snapshot (if any) and build the store.
    pub fn new(snapshot_path: impl Into<PathBuf>, ttl_secs: u64, analysis_interval: u32) -> Self {
        let snapshot_path = snapshot_path.into();
        let contexts = load_snapshot(&snapshot_path);
        Self {
            contexts: Mutex::new(contexts),
            snapshot_path,
            ttl: Duration::seconds(ttl_secs as i64),
            analysis_interval: analysis_interval.max(1),
            deep_completer: Mutex::new(None),
        }
    }

    /// Late-bind the completer used for deep interest analysis.
    pub fn set_deep_completer(&self, completer: Arc<dyn TextCompleter>) {
        *self.deep_completer.lock().unwrap() = Some(completer);
    }

    /// Append a message, stamping it with the current time.
    ///
    /// User messages run the fast interest extractor inline, and every
    /// `analysis_interval`-th one schedules a deep LLM analysis in the
    /// background which replaces the tag set when it parses cleanly.
    pub fn append(self: &Arc<Self>, user_id: &UserId, role: MessageRole, content: &str) {
        let now = Utc::now();
        let deep_input = {
            let mut contexts = self.contexts.lock().unwrap();
            let ctx = contexts
                .entry(user_id.clone())
                .or_insert_with(|| ConversationContext::new(user_id.clone(), now));
            ctx.messages.push(ConversationMessage {
                role,
                content: content.to_string(),
                timestamp: now,
            });
            ctx.last_interaction = now;

            if role == MessageRole::User {
                ctx.msgs_since_analysis += 1;
                for tag in interest::extract_fast(content) {
                    ctx.interests.insert(tag);
                }
                if ctx.msgs_since_analysis % self.analysis_interval == 0 {
                    let start = ctx.messages.len().saturating_sub(DEEP_ANALYSIS_WINDOW);
                    Some((ctx.messages[start..].to_vec(), ctx.interests.clone()))
                } else {
                    None
                }
            } else {
                None
            }
        };

        self.save_snapshot();

        if let Some((recent, current)) = deep_input {
            let completer = self.deep_completer.lock().unwrap().clone();
            if let Some(completer) = completer {
                let store = Arc::clone(self);
                let user_id = user_id.clone();
                tokio::spawn(async move {
                    if let Some(tags) =
                        interest::refresh_deep(completer.as_ref(), &recent, &current).await
                    {
                        debug!(user_id = %user_id, ?tags, "deep interest analysis replaced tags");
                        store.replace_interests(&user_id, tags);
                    }
                });
            }
        }
    }

    /// Messages within the TTL window, oldest first. Expired messages are
    /// filtered here rather than eagerly purged.
    pub fn history(&self, user_id: &UserId) -> Vec<ConversationMessage> {
        let cutoff = Utc::now() - self.ttl;
        let contexts = self.contexts.lock().unwrap();
        contexts
            .get(user_id)
            .map(|ctx| {
                ctx.messages
                    .iter()
                    .filter(|m| m.timestamp > cutoff)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Users whose last interaction is within the TTL.
    pub fn active_users(&self) -> Vec<UserId> {
        let cutoff = Utc::now() - self.ttl;
        let contexts = self.contexts.lock().unwrap();
        contexts
            .values()
            .filter(|ctx| ctx.last_interaction > cutoff)
            .map(|ctx| ctx.user_id.clone())
            .collect()
    }

    pub fn interests(&self, user_id: &UserId) -> std::collections::BTreeSet<String> {
        let contexts = self.contexts.lock().unwrap();
        contexts
            .get(user_id)
            .map(|ctx| ctx.interests.clone())
            .unwrap_or_default()
    }

    /// Replace the tag set wholesale (deep analysis result).
    pub fn replace_interests(&self, user_id: &UserId, tags: std::collections::BTreeSet<String>) {
        {
            let mut contexts = self.contexts.lock().unwrap();
            if let Some(ctx) = contexts.get_mut(user_id) {
                ctx.interests = tags;
            }
        }
        self.save_snapshot();
    }

    /// Evict every context idle for at least the TTL, archiving a summary
    /// of each before it is destroyed. Returns the number evicted.
    pub async fn cleanup_expired(
        &self,
        completer: &dyn TextCompleter,
        summaries: &SummaryStore,
    ) -> usize {
        let cutoff = Utc::now() - self.ttl;
        let expired: Vec<ConversationContext> = {
            let mut contexts = self.contexts.lock().unwrap();
            let ids: Vec<UserId> = contexts
                .values()
                .filter(|ctx| ctx.last_interaction <= cutoff)
                .map(|ctx| ctx.user_id.clone())
                .collect();
            ids.iter().filter_map(|id| contexts.remove(id)).collect()
        };

        for ctx in &expired {
            match summaries
                .summarize_and_archive(completer, &ctx.user_id, &ctx.messages)
                .await
            {
                Ok(stored) => {
                    debug!(user_id = %ctx.user_id, stored, "context evicted");
                }
                Err(e) => {
                    warn!(user_id = %ctx.user_id, error = %e, "archive on eviction failed");
                }
            }
        }

        if !expired.is_empty() {
            self.save_snapshot();
        }
        expired.len()
    }

    /// Snapshot of every live context (for wiring-level introspection).
    pub fn len(&self) -> usize {
        self.contexts.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Best-effort durable snapshot. Loss here costs at most the short-term
    /// window, never durable state, so failures only warn.
    fn save_snapshot(&self) {
        let json = {
            let contexts = self.contexts.lock().unwrap();
            serde_json::to_vec_pretty(&*contexts)
        };
        match json {
            Ok(bytes) => {
                if let Some(parent) = self.snapshot_path.parent() {
                    let _ = std::fs::create_dir_all(parent);
                }
                if let Err(e) = std::fs::write(&self.snapshot_path, bytes) {
                    warn!(path = %self.snapshot_path.display(), error = %e, "context snapshot write failed");
                }
            }
            Err(e) => warn!(error = %e, "context snapshot serialization failed"),
        }
    }

    #[cfg(test)]
    fn insert_raw(&self, ctx: ConversationContext) {
        self.contexts.lock().unwrap().insert(ctx.user_id.clone(), ctx);
    }
}

fn load_snapshot(path: &PathBuf) -> HashMap<UserId, ConversationContext> {
    match std::fs::read(path) {
        Ok(bytes) => match serde_json::from_slice(&bytes) {
            Ok(contexts) => contexts,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "context snapshot unreadable, starting empty");
                HashMap::new()
            }
        },
        Err(_) => HashMap::new(),
    }
}
