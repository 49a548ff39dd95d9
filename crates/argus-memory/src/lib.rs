//! Three-tier conversation memory: short-term rolling context, durable
//! summaries, and the append-only message history, plus the user profile
//! and inbound replay markers that share the same SQLite database.

pub mod context;
pub mod db;
pub mod error;
pub mod history;
pub mod interest;
pub mod processed;
pub mod profile;
pub mod summary;
pub mod types;

pub use context::ContextStore;
pub use error::{MemoryError, Result};
pub use history::HistoryStore;
pub use processed::ProcessedMessages;
pub use profile::UserProfileStore;
pub use summary::SummaryStore;
