//! The autonomous heartbeat: a one-minute tick loop that interleaves
//! crawling, fresh-content accumulation, batched digest flushing, and
//! periodic maintenance.

pub mod engine;

pub use engine::{SchedulerDeps, SchedulerEngine};
