//! Outbound action queue: strict priority scheduling, a single consumer
//! that enforces the transport rate limit, linear retry backoff, and
//! per-user proactive cooldowns.

pub mod queue;
pub mod types;
pub mod worker;

pub use queue::ActionQueue;
pub use types::{ActionKind, EnqueueRequest, QueueStats, QueuedAction};
