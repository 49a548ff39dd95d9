//! Single-consumer delivery loop.
//!
//! Exactly one send is in flight at any time, which is what keeps the
//! outbound transport inside its rate limit. After every successful send
//! the worker pauses for the configured delay before the next pop.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::queue::ActionQueue;
use crate::types::QueuedAction;

/// Poll cadence when the queue is idle.
const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Run the delivery loop until `shutdown` broadcasts `true`.
pub async fn run(queue: Arc<ActionQueue>, mut shutdown: watch::Receiver<bool>) {
    info!("action queue worker started");
    let mut interval = tokio::time::interval(POLL_INTERVAL);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                if let Some(action) = queue.pop_eligible(Utc::now()) {
                    deliver(&queue, action).await;
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    info!("action queue worker shutting down");
                    break;
                }
            }
        }
    }
}

async fn deliver(queue: &Arc<ActionQueue>, action: QueuedAction) {
    let Some(sender) = queue.sender() else {
        // Nothing registered yet; put the action back untouched.
        debug!(action_id = %action.id, "no sender registered, deferring action");
        queue.requeue_unsent(action);
        return;
    };

    // The cooldown is enforced again at pop time: a proactive action that
    // sat behind a backlog must not violate the per-user gap.
    if ActionQueue::is_proactive(&action) && !queue.can_send_proactive(&action.user_id) {
        warn!(
            action_id = %action.id,
            user_id = %action.user_id,
            "proactive action dropped: cooldown still active"
        );
        queue.record_dropped();
        return;
    }

    match sender
        .send(&action.user_id, &action.content, action.kind.message_kind())
        .await
    {
        Ok(()) => {
            if ActionQueue::is_proactive(&action) {
                queue.mark_proactive_sent(&action.user_id);
            }
            queue.record_executed();
            debug!(action_id = %action.id, user_id = %action.user_id, "action delivered");
            // Post-send pause keeps consecutive sends apart.
            tokio::time::sleep(Duration::from_millis(queue.rate_limit_delay_ms)).await;
        }
        Err(e) => {
            if action.retry_count < queue.max_retries {
                warn!(
                    action_id = %action.id,
                    retry = action.retry_count + 1,
                    error = %e,
                    "send failed, scheduling retry"
                );
                queue.requeue(action);
            } else {
                warn!(
                    action_id = %action.id,
                    user_id = %action.user_id,
                    error = %e,
                    "send failed after max retries, dropping"
                );
                queue.record_dropped();
            }
        }
    }
}
