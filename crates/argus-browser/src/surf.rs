//! The autonomous crawl loop: pick a hub, harvest article candidates,
//! fetch what changed, enrich, and learn into the knowledge base.
//!
//! The loop checks a cancellation flag between fetches so an inbound user
//! message interrupts a crawl within one page fetch.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use md5::{Digest, Md5};
use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{debug, info, warn};

use argus_core::config::BrowserConfig;
use argus_core::provider::{LinkExtractor, PageFetcher, SearchProvider, TextCompleter};
use argus_knowledge::{KnowledgeBase, KnowledgeError};

use crate::error::Result;
use crate::fetch::origin;
use crate::hubs::HubList;
use crate::tracker::LinkTracker;
use crate::types::SurfReport;

/// Articles attempted per hub visit.
const ARTICLES_PER_SESSION: usize = 5;
/// Bodies shorter than this are navigation chrome, not articles.
const MIN_ARTICLE_CHARS: usize = 300;
/// Chance of promoting an article's origin to a new favorite hub.
const DISCOVERY_PROBABILITY: f64 = 0.05;

struct PageBudget {
    window_start: DateTime<Utc>,
    used: u32,
}

pub struct Browser {
    hubs: HubList,
    tracker: LinkTracker,
    fetcher: Arc<dyn PageFetcher>,
    extractor: Arc<dyn LinkExtractor>,
    completer: Arc<dyn TextCompleter>,
    search: Arc<dyn SearchProvider>,
    kb: Arc<KnowledgeBase>,
    cancel: AtomicBool,
    budget: Mutex<PageBudget>,
    max_pages_per_hour: u32,
    hub_cooldown: Duration,
    link_stale: Duration,
}

impl Browser {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        data_dir: &Path,
        cfg: &BrowserConfig,
        fetcher: Arc<dyn PageFetcher>,
        extractor: Arc<dyn LinkExtractor>,
        completer: Arc<dyn TextCompleter>,
        search: Arc<dyn SearchProvider>,
        kb: Arc<KnowledgeBase>,
    ) -> Self {
        Self {
            hubs: HubList::load(data_dir.join("favorites.json")),
            tracker: LinkTracker::load(data_dir.join("link_tracker.json")),
            fetcher,
            extractor,
            completer,
            search,
            kb,
            cancel: AtomicBool::new(false),
            budget: Mutex::new(PageBudget {
                window_start: Utc::now(),
                used: 0,
            }),
            max_pages_per_hour: cfg.max_pages_per_hour,
            hub_cooldown: Duration::seconds(cfg.hub_cooldown_secs as i64),
            link_stale: Duration::milliseconds(cfg.link_stale_ms as i64),
        }
    }

    /// Ask the current crawl to yield before its next fetch. Called when an
    /// inbound user message arrives; never affects user-facing work.
    pub fn stop_browsing(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    /// One crawl session. With an intent, hub selection is steered toward
    /// matching categories; otherwise the stalest cooled-down hub wins.
    pub async fn surf(&self, intent: Option<&str>) -> Result<SurfReport> {
        self.cancel.store(false, Ordering::Relaxed);
        let mut report = SurfReport::default();

        if self.pages_remaining() == 0 {
            debug!("page budget exhausted, skipping crawl");
            return Ok(report);
        }
        let Some(hub) = self.hubs.pick(intent, self.hub_cooldown) else {
            debug!(?intent, "no eligible hub");
            return Ok(report);
        };
        if !self.consume_page() {
            return Ok(report);
        }

        let links = match self.extractor.extract_links(&hub.url).await {
            Ok(links) => links,
            Err(e) => {
                warn!(hub = %hub.url, error = %e, "link extraction failed");
                self.hubs.mark_visited(&hub.url);
                return Ok(report);
            }
        };
        self.hubs.mark_visited(&hub.url);

        let mut candidates = links;
        candidates.shuffle(&mut rand::thread_rng());
        candidates.truncate(ARTICLES_PER_SESSION);

        for link in candidates {
            if self.cancelled() {
                info!(hub = %hub.url, "crawl interrupted by inbound message");
                break;
            }

            let previously_scraped = self.tracker.get(&link.url);
            if self.tracker.is_fresh(&link.url, self.link_stale) {
                report.skipped += 1;
                continue;
            }

            if !self.consume_page() {
                debug!("page budget exhausted mid-session");
                break;
            }
            let content = match self.fetcher.fetch(&link.url).await {
                Ok(c) => c,
                Err(e) => {
                    debug!(url = %link.url, error = %e, "article fetch failed");
                    report.skipped += 1;
                    continue;
                }
            };
            report.visited.push(link.url.clone());

            if content.chars().count() < MIN_ARTICLE_CHARS {
                report.skipped += 1;
                continue;
            }

            let content_hash = hex::encode(Md5::digest(content.as_bytes()));

            if let Some(ref tracked) = previously_scraped {
                if tracked.content_hash == content_hash {
                    self.tracker.update(&link.url, &content_hash);
                    report.skipped += 1;
                    continue;
                }
            }
            if self.kb.has_content_hash(&content_hash)? {
                // Same body already learned from another source.
                self.tracker.update(&link.url, &content_hash);
                report.skipped += 1;
                continue;
            }

            let enrichment = self.enrich(&content).await;
            let mut tags = vec!["autonomous_browse".to_string(), hub.category.clone()];
            if previously_scraped.is_some() {
                tags.push("updated_content".to_string());
            }
            if enrichment.is_some() {
                tags.push("enriched".to_string());
            }
            let body = match &enrichment {
                Some(extra) => format!("{content}\n\n{extra}"),
                None => content,
            };

            match self
                .kb
                .learn(&body, &link.url, &hub.category, &tags, Utc::now(), &content_hash)
                .await
            {
                Ok(_) => report.learned += 1,
                Err(KnowledgeError::DuplicateContent { .. })
                | Err(KnowledgeError::ContentTooShort { .. }) => {
                    report.skipped += 1;
                }
                Err(KnowledgeError::Provider(e)) => {
                    debug!(url = %link.url, error = %e, "embedding failed, article dropped");
                    report.skipped += 1;
                }
                Err(e) => return Err(e.into()),
            }
            self.tracker.update(&link.url, &content_hash);

            if rand::thread_rng().gen::<f64>() < DISCOVERY_PROBABILITY {
                if let Some(origin) = origin(&link.url) {
                    self.hubs.add_discovered(&origin, &hub.category);
                }
            }
        }

        self.tracker.save();
        info!(
            hub = %hub.url,
            visited = report.visited.len(),
            learned = report.learned,
            skipped = report.skipped,
            "surf session complete"
        );
        Ok(report)
    }

    /// Checkpoint favorites and tracker. Called by scheduler maintenance.
    pub fn checkpoint(&self) {
        self.hubs.save();
        self.tracker.save();
    }

    pub fn pages_remaining(&self) -> u32 {
        let mut budget = self.budget.lock().unwrap();
        reset_if_elapsed(&mut budget);
        self.max_pages_per_hour.saturating_sub(budget.used)
    }

    fn consume_page(&self) -> bool {
        let mut budget = self.budget.lock().unwrap();
        reset_if_elapsed(&mut budget);
        if budget.used >= self.max_pages_per_hour {
            return false;
        }
        budget.used += 1;
        true
    }

    /// Ask for a 1–2 item verification checklist and attach search snippets
    /// for each item. Any failure falls back to no enrichment.
    async fn enrich(&self, content: &str) -> Option<String> {
        let excerpt: String = content.chars().take(1500).collect();
        let system = "Read the article excerpt and list 1-2 facts or unfamiliar terms \
                      that would benefit from external verification. Respond with ONLY \
                      a JSON array of short search phrases.";
        let response = self.completer.complete(system, &excerpt).await.ok()?;
        let items = parse_checklist(&response)?;

        let mut section = String::from("## Research Context\n");
        let mut found = false;
        for item in items.iter().take(2) {
            let hits = match self.search.search(item, 2).await {
                Ok(hits) => hits,
                Err(e) => {
                    debug!(item = %item, error = %e, "enrichment search failed");
                    continue;
                }
            };
            for hit in hits {
                section.push_str(&format!("- {} ({}): {}\n", hit.title, hit.url, hit.snippet));
                found = true;
            }
        }
        if found {
            Some(section)
        } else {
            None
        }
    }
}

fn reset_if_elapsed(budget: &mut PageBudget) {
    let now = Utc::now();
    if now - budget.window_start >= Duration::hours(1) {
        budget.window_start = now;
        budget.used = 0;
    }
}

fn parse_checklist(response: &str) -> Option<Vec<String>> {
    let start = response.find('[')?;
    let end = response.rfind(']')?;
    if end <= start {
        return None;
    }
    let items: Vec<String> = serde_json::from_str(&response[start..=end]).ok()?;
    let items: Vec<String> = items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    if items.is_empty() {
        None
    } else {
        Some(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use argus_core::provider::{ArticleLink, Embedder, ProviderError, SearchHit};
    use async_trait::async_trait;
    use rusqlite::Connection;
    use std::collections::HashMap;
    use std::sync::atomic::AtomicUsize;

    struct StubEmbedder;

    #[async_trait]
    impl Embedder for StubEmbedder {
        async fn embed(&self, _text: &str) -> std::result::Result<Vec<f32>, ProviderError> {
            Ok(vec![1.0, 0.0])
        }
    }

    /// Serves canned bodies and optionally raises the browser's cancel flag
    /// after the first successful fetch.
    struct MockFetcher {
        pages: HashMap<String, String>,
        fetches: AtomicUsize,
        cancel_after_first: Mutex<Option<Arc<dyn Fn() + Send + Sync>>>,
    }

    impl MockFetcher {
        fn new(pages: HashMap<String, String>) -> Self {
            Self {
                pages,
                fetches: AtomicUsize::new(0),
                cancel_after_first: Mutex::new(None),
            }
        }
    }

    #[async_trait]
    impl PageFetcher for MockFetcher {
        async fn fetch(&self, url: &str) -> std::result::Result<String, ProviderError> {
            let n = self.fetches.fetch_add(1, Ordering::SeqCst);
            if n == 0 {
                if let Some(hook) = self.cancel_after_first.lock().unwrap().as_ref() {
                    hook();
                }
            }
            self.pages
                .get(url)
                .cloned()
                .ok_or_else(|| ProviderError::Http(format!("no page for {url}")))
        }
    }

    struct MockExtractor {
        links: Vec<ArticleLink>,
    }

    #[async_trait]
    impl LinkExtractor for MockExtractor {
        async fn extract_links(
            &self,
            _hub_url: &str,
        ) -> std::result::Result<Vec<ArticleLink>, ProviderError> {
            Ok(self.links.clone())
        }
    }

    struct FailingCompleter;

    #[async_trait]
    impl TextCompleter for FailingCompleter {
        async fn complete(
            &self,
            _system: &str,
            _user: &str,
        ) -> std::result::Result<String, ProviderError> {
            Err(ProviderError::Unavailable("no llm in tests".into()))
        }
    }

    struct EmptySearch;

    #[async_trait]
    impl SearchProvider for EmptySearch {
        async fn search(
            &self,
            _query: &str,
            _limit: usize,
        ) -> std::result::Result<Vec<SearchHit>, ProviderError> {
            Ok(Vec::new())
        }
    }

    fn article_body(tag: &str) -> String {
        format!("{tag} {}", "lorem ipsum dolor sit amet ".repeat(20))
    }

    fn link(url: &str) -> ArticleLink {
        ArticleLink {
            url: url.to_string(),
            title: "story".to_string(),
        }
    }

    fn kb() -> Arc<KnowledgeBase> {
        Arc::new(
            KnowledgeBase::new(Connection::open_in_memory().unwrap(), Arc::new(StubEmbedder), 0.6, 24)
                .unwrap(),
        )
    }

    fn browser(
        dir: &tempfile::TempDir,
        fetcher: Arc<MockFetcher>,
        links: Vec<ArticleLink>,
        kb: Arc<KnowledgeBase>,
    ) -> Browser {
        let mut b = Browser::new(
            dir.path(),
            &BrowserConfig::default(),
            fetcher,
            Arc::new(MockExtractor { links }),
            Arc::new(FailingCompleter),
            Arc::new(EmptySearch),
            kb,
        );
        // Tests use a tiny deterministic hub list.
        b.hubs = HubList::load(dir.path().join("test_hubs.json"));
        b
    }

    #[tokio::test]
    async fn surf_learns_new_articles() {
        let dir = tempfile::tempdir().unwrap();
        let pages = HashMap::from([
            ("https://hub.example/a".to_string(), article_body("alpha")),
            ("https://hub.example/b".to_string(), article_body("beta")),
        ]);
        let kb = kb();
        let b = browser(
            &dir,
            Arc::new(MockFetcher::new(pages)),
            vec![link("https://hub.example/a"), link("https://hub.example/b")],
            Arc::clone(&kb),
        );

        let report = b.surf(None).await.unwrap();
        assert_eq!(report.learned, 2);
        assert_eq!(kb.stats().unwrap().total_documents, 2);
        // Tracker remembers both URLs.
        assert!(b.tracker.get("https://hub.example/a").is_some());
    }

    #[tokio::test]
    async fn identical_bodies_across_urls_dedup_by_hash() {
        let dir = tempfile::tempdir().unwrap();
        let body = article_body("same");
        let pages = HashMap::from([
            ("https://hub-a.example/x".to_string(), body.clone()),
            ("https://hub-b.example/y".to_string(), body),
        ]);
        let kb = kb();
        let b = browser(
            &dir,
            Arc::new(MockFetcher::new(pages)),
            vec![link("https://hub-a.example/x"), link("https://hub-b.example/y")],
            Arc::clone(&kb),
        );

        let report = b.surf(None).await.unwrap();
        assert_eq!(report.learned, 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(kb.stats().unwrap().total_documents, 1);
        // The skipped URL still gets a tracker entry.
        assert!(b.tracker.get("https://hub-a.example/x").is_some());
        assert!(b.tracker.get("https://hub-b.example/y").is_some());
    }

    #[tokio::test]
    async fn recently_scraped_urls_are_skipped_without_fetch() {
        let dir = tempfile::tempdir().unwrap();
        let pages = HashMap::from([("https://hub.example/a".to_string(), article_body("alpha"))]);
        let fetcher = Arc::new(MockFetcher::new(pages));
        let kb = kb();
        let b = browser(
            &dir,
            Arc::clone(&fetcher),
            vec![link("https://hub.example/a")],
            kb,
        );
        b.tracker.update("https://hub.example/a", "previous-hash");

        let report = b.surf(None).await.unwrap();
        assert_eq!(report.learned, 0);
        assert_eq!(report.skipped, 1);
        assert_eq!(fetcher.fetches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn short_bodies_are_not_learned() {
        let dir = tempfile::tempdir().unwrap();
        let pages = HashMap::from([("https://hub.example/a".to_string(), "too short".to_string())]);
        let kb = kb();
        let b = browser(
            &dir,
            Arc::new(MockFetcher::new(pages)),
            vec![link("https://hub.example/a")],
            Arc::clone(&kb),
        );

        let report = b.surf(None).await.unwrap();
        assert_eq!(report.learned, 0);
        assert_eq!(kb.stats().unwrap().total_documents, 0);
    }

    #[tokio::test]
    async fn interrupt_stops_the_session_within_one_fetch() {
        let dir = tempfile::tempdir().unwrap();
        let pages: HashMap<String, String> = (0..5)
            .map(|i| (format!("https://hub.example/{i}"), article_body(&format!("a{i}"))))
            .collect();
        let fetcher = Arc::new(MockFetcher::new(pages));
        let kb = kb();
        let links: Vec<ArticleLink> = (0..5)
            .map(|i| link(&format!("https://hub.example/{i}")))
            .collect();
        let b = Arc::new(browser(&dir, Arc::clone(&fetcher), links, kb));

        let cancel_target = Arc::clone(&b);
        *fetcher.cancel_after_first.lock().unwrap() =
            Some(Arc::new(move || cancel_target.stop_browsing()));

        let report = b.surf(None).await.unwrap();
        // First article completes, the flag stops everything after it.
        assert_eq!(fetcher.fetches.load(Ordering::SeqCst), 1);
        assert_eq!(report.learned, 1);
    }

    #[tokio::test]
    async fn exhausted_budget_returns_immediately() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = BrowserConfig {
            max_pages_per_hour: 0,
            ..BrowserConfig::default()
        };
        let kb = kb();
        let b = Browser::new(
            dir.path(),
            &cfg,
            Arc::new(MockFetcher::new(HashMap::new())),
            Arc::new(MockExtractor { links: vec![] }),
            Arc::new(FailingCompleter),
            Arc::new(EmptySearch),
            kb,
        );

        let report = b.surf(None).await.unwrap();
        assert!(report.visited.is_empty());
        assert_eq!(report.learned, 0);
    }

    #[test]
    fn checklist_parsing_tolerates_prose() {
        let items = parse_checklist("Sure! [\"quantum error correction\", \"IBM Heron\"]").unwrap();
        assert_eq!(items.len(), 2);
        assert!(parse_checklist("no list here").is_none());
        assert!(parse_checklist("[]").is_none());
    }
}
