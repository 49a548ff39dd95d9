//! Autonomous web browsing: favorite hubs with cooldowns, per-URL change
//! detection, a budgeted and cancellable crawl loop, and LLM-assisted
//! enrichment of learned articles.

pub mod error;
pub mod fetch;
pub mod hubs;
pub mod surf;
pub mod tracker;
pub mod types;

pub use error::{BrowserError, Result};
pub use surf::Browser;
pub use types::{FavoriteHub, HubSource, LinkTrackingEntry, SurfReport};
