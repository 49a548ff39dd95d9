use std::sync::{Mutex, RwLock};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use tracing::{debug, info};
use uuid::Uuid;

use argus_core::config::QueueConfig;
use argus_core::provider::MessageSender;
use argus_core::types::UserId;

use crate::types::{ActionKind, EnqueueRequest, QueueStats, QueuedAction};

const DEFAULT_PRIORITY: u8 = 5;

/// In-memory outbound queue.
///
/// Actions live in a dense arena scanned on pop; the queue never hands out
/// references into it. The per-user cooldown map records the last successful
/// proactive send and is consulted both at enqueue sites and by the worker.
pub struct ActionQueue {
    actions: Mutex<Vec<QueuedAction>>,
    last_proactive: DashMap<UserId, DateTime<Utc>>,
    sender: RwLock<Option<Arc<dyn MessageSender>>>,
    stats: Mutex<QueueStats>,
    proactive_cooldown: Duration,
    pub(crate) rate_limit_delay_ms: u64,
    pub(crate) max_retries: u32,
}

impl ActionQueue {
    pub fn new(cfg: &QueueConfig) -> Self {
        Self {
            actions: Mutex::new(Vec::new()),
            last_proactive: DashMap::new(),
            sender: RwLock::new(None),
            stats: Mutex::new(QueueStats::default()),
            proactive_cooldown: Duration::seconds(cfg.proactive_cooldown_secs as i64),
            rate_limit_delay_ms: cfg.rate_limit_delay_ms,
            max_retries: cfg.max_retries,
        }
    }

    /// Wire the external transport in. Until this is called the worker
    /// leaves actions queued.
    pub fn register_sender(&self, sender: Arc<dyn MessageSender>) {
        *self.sender.write().unwrap() = Some(sender);
    }

    pub(crate) fn sender(&self) -> Option<Arc<dyn MessageSender>> {
        self.sender.read().unwrap().clone()
    }

    pub fn enqueue(&self, req: EnqueueRequest) -> String {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let action = QueuedAction {
            id: id.clone(),
            kind: req.kind,
            user_id: req.user_id,
            content: req.content,
            scheduled_for: now + req.delay.unwrap_or_else(Duration::zero),
            priority: req.priority.unwrap_or(DEFAULT_PRIORITY).clamp(1, 10),
            retry_count: 0,
            metadata: req.metadata.unwrap_or(serde_json::Value::Null),
            created_at: now,
        };
        debug!(action_id = %id, kind = ?action.kind, priority = action.priority, "action enqueued");
        self.actions.lock().unwrap().push(action);
        id
    }

    /// Remove and return the best eligible action:
    /// highest priority first, earliest schedule among equals.
    pub(crate) fn pop_eligible(&self, now: DateTime<Utc>) -> Option<QueuedAction> {
        let mut actions = self.actions.lock().unwrap();
        let best = actions
            .iter()
            .enumerate()
            .filter(|(_, a)| a.scheduled_for <= now)
            .min_by_key(|(_, a)| (std::cmp::Reverse(a.priority), a.scheduled_for, a.created_at))
            .map(|(i, _)| i)?;
        Some(actions.remove(best))
    }

    /// Put a failed action back with its retry delay applied.
    pub(crate) fn requeue(&self, mut action: QueuedAction) {
        action.retry_count += 1;
        // Linear backoff: 30s, 60s, 90s...
        action.scheduled_for = Utc::now() + Duration::seconds(30 * action.retry_count as i64);
        self.actions.lock().unwrap().push(action);
        self.stats.lock().unwrap().retried += 1;
    }

    /// Defer an action the worker could not attempt (no sender registered).
    /// Does not count as a retry.
    pub(crate) fn requeue_unsent(&self, mut action: QueuedAction) {
        action.scheduled_for = Utc::now() + Duration::seconds(5);
        self.actions.lock().unwrap().push(action);
    }

    pub(crate) fn record_executed(&self) {
        self.stats.lock().unwrap().executed += 1;
    }

    pub(crate) fn record_dropped(&self) {
        self.stats.lock().unwrap().dropped += 1;
    }

    /// Whether a proactive message may go to this user now.
    pub fn can_send_proactive(&self, user_id: &UserId) -> bool {
        self.proactive_cooldown_remaining(user_id) <= Duration::zero()
    }

    /// Time left until the next proactive send is allowed (zero when clear).
    pub fn proactive_cooldown_remaining(&self, user_id: &UserId) -> Duration {
        match self.last_proactive.get(user_id) {
            Some(last) => {
                let elapsed = Utc::now() - *last;
                (self.proactive_cooldown - elapsed).max(Duration::zero())
            }
            None => Duration::zero(),
        }
    }

    /// Record a successful proactive send, starting the cooldown.
    pub fn mark_proactive_sent(&self, user_id: &UserId) {
        self.last_proactive.insert(user_id.clone(), Utc::now());
    }

    pub fn cancel(&self, action_id: &str) -> bool {
        let mut actions = self.actions.lock().unwrap();
        let before = actions.len();
        actions.retain(|a| a.id != action_id);
        let cancelled = actions.len() < before;
        if cancelled {
            info!(action_id, "action cancelled");
        }
        cancelled
    }

    pub fn user_actions(&self, user_id: &UserId) -> Vec<QueuedAction> {
        self.actions
            .lock()
            .unwrap()
            .iter()
            .filter(|a| &a.user_id == user_id)
            .cloned()
            .collect()
    }

    pub fn stats(&self) -> QueueStats {
        let mut stats = self.stats.lock().unwrap().clone();
        stats.pending = self.actions.lock().unwrap().len();
        stats
    }

    pub fn clear(&self) {
        self.actions.lock().unwrap().clear();
    }

    pub(crate) fn is_proactive(action: &QueuedAction) -> bool {
        action.kind == ActionKind::Proactive
    }
}
