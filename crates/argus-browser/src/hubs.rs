//! Favorite hub management: cooldown-aware selection and organic growth
//! through discovery.

use std::path::PathBuf;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use tracing::{info, warn};

use crate::types::{FavoriteHub, HubSource};

/// Compiled-in starting set; replaced by the snapshot once one exists.
const DEFAULT_HUBS: [(&str, &str); 6] = [
    ("https://news.ycombinator.com", "tech"),
    ("https://www.theverge.com", "tech"),
    ("https://www.reuters.com/business", "finance"),
    ("https://www.bbc.com/news", "news"),
    ("https://www.espn.com", "sports"),
    ("https://www.sciencedaily.com", "science"),
];

pub struct HubList {
    hubs: Mutex<Vec<FavoriteHub>>,
    path: PathBuf,
}

impl HubList {
    /// Load the snapshot, falling back to the compiled-in defaults.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let hubs = match std::fs::read(&path) {
            Ok(bytes) => match serde_json::from_slice(&bytes) {
                Ok(hubs) => hubs,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "favorites snapshot unreadable, reseeding");
                    seed_defaults()
                }
            },
            Err(_) => seed_defaults(),
        };
        Self {
            hubs: Mutex::new(hubs),
            path,
        }
    }

    /// Pick the next hub to visit.
    ///
    /// With an intent, candidates are narrowed by category/url substring.
    /// Among candidates only those past the cooldown are eligible and the
    /// stalest wins; a lone intent-matched candidate may bypass the
    /// cooldown so a directed research request is never starved.
    pub fn pick(&self, intent: Option<&str>, cooldown: Duration) -> Option<FavoriteHub> {
        let hubs = self.hubs.lock().unwrap();
        select_hub(&hubs, intent, cooldown, Utc::now()).map(|i| hubs[i].clone())
    }

    pub fn mark_visited(&self, url: &str) {
        {
            let mut hubs = self.hubs.lock().unwrap();
            if let Some(hub) = hubs.iter_mut().find(|h| h.url == url) {
                hub.last_visited = Some(Utc::now());
                hub.visit_count += 1;
            }
        }
        self.save();
    }

    /// Add a discovered origin as a new hub. Returns `false` when already known.
    pub fn add_discovered(&self, url: &str, category: &str) -> bool {
        let added = {
            let mut hubs = self.hubs.lock().unwrap();
            if hubs.iter().any(|h| h.url == url) {
                false
            } else {
                hubs.push(FavoriteHub {
                    url: url.to_string(),
                    category: category.to_string(),
                    last_visited: None,
                    visit_count: 0,
                    added_at: Utc::now(),
                    source: HubSource::Discovered,
                });
                true
            }
        };
        if added {
            info!(url, category, "discovered new hub");
            self.save();
        }
        added
    }

    pub fn len(&self) -> usize {
        self.hubs.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn save(&self) {
        let json = {
            let hubs = self.hubs.lock().unwrap();
            serde_json::to_vec_pretty(&*hubs)
        };
        match json {
            Ok(bytes) => {
                if let Some(parent) = self.path.parent() {
                    let _ = std::fs::create_dir_all(parent);
                }
                if let Err(e) = std::fs::write(&self.path, bytes) {
                    warn!(path = %self.path.display(), error = %e, "favorites snapshot write failed");
                }
            }
            Err(e) => warn!(error = %e, "favorites serialization failed"),
        }
    }
}

fn seed_defaults() -> Vec<FavoriteHub> {
    let now = Utc::now();
    DEFAULT_HUBS
        .iter()
        .map(|(url, category)| FavoriteHub {
            url: url.to_string(),
            category: category.to_string(),
            last_visited: None,
            visit_count: 0,
            added_at: now,
            source: HubSource::Default,
        })
        .collect()
}

/// Pure selection: index of the hub to visit, if any.
fn select_hub(
    hubs: &[FavoriteHub],
    intent: Option<&str>,
    cooldown: Duration,
    now: DateTime<Utc>,
) -> Option<usize> {
    let matches_intent = |hub: &FavoriteHub| match intent {
        Some(intent) => {
            let needle = intent.to_lowercase();
            hub.category.to_lowercase().contains(&needle)
                || hub.url.to_lowercase().contains(&needle)
        }
        None => true,
    };
    let candidates: Vec<usize> = hubs
        .iter()
        .enumerate()
        .filter(|(_, h)| matches_intent(h))
        .map(|(i, _)| i)
        .collect();

    let cooled = |i: &usize| match hubs[*i].last_visited {
        Some(ts) => now - ts >= cooldown,
        None => true,
    };
    let eligible: Vec<usize> = candidates.iter().copied().filter(cooled).collect();

    if eligible.is_empty() {
        // Directed requests with exactly one match may bypass the cooldown.
        if intent.is_some() && candidates.len() == 1 {
            return Some(candidates[0]);
        }
        return None;
    }

    // Stalest first; never-visited hubs sort ahead of everything.
    eligible
        .into_iter()
        .min_by_key(|i| hubs[*i].last_visited.map(|ts| ts.timestamp()).unwrap_or(i64::MIN))
}
