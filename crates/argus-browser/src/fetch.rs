//! Default reqwest-backed implementations of the page-fetching capabilities.
//!
//! These are deliberately crude: no JS rendering, no readability heuristics.
//! Deployments that need a headless renderer inject their own
//! [`PageFetcher`] / [`LinkExtractor`] instead.

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;

use argus_core::provider::{ArticleLink, LinkExtractor, PageFetcher, ProviderError};

const USER_AGENT: &str = "argus/0.1 (+autonomous research agent)";
/// Hard cap on cleaned page text handed to the rest of the pipeline.
const MAX_PAGE_CHARS: usize = 20_000;
const MAX_LINKS: usize = 50;

static SCRIPT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<(script|style|noscript)[^>]*>.*?</(script|style|noscript)>").unwrap());
static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<[^>]+>").unwrap());
static ANCHOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?is)<a\s[^>]*href\s*=\s*["']([^"'#][^"']*)["'][^>]*>(.*?)</a>"#).unwrap());
static WS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

pub struct HttpPageFetcher {
    client: reqwest::Client,
}

impl HttpPageFetcher {
    pub fn new(timeout_secs: u64) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_default();
        Self { client }
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn fetch(&self, url: &str) -> Result<String, ProviderError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(to_provider_error)?;
        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Api {
                status: status.as_u16(),
                message: format!("GET {url}"),
            });
        }
        let html = response.text().await.map_err(to_provider_error)?;
        Ok(clean_html(&html))
    }
}

pub struct HttpLinkExtractor {
    client: reqwest::Client,
}

impl HttpLinkExtractor {
    pub fn new(timeout_secs: u64) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_default();
        Self { client }
    }
}

#[async_trait]
impl LinkExtractor for HttpLinkExtractor {
    async fn extract_links(&self, hub_url: &str) -> Result<Vec<ArticleLink>, ProviderError> {
        let response = self
            .client
            .get(hub_url)
            .send()
            .await
            .map_err(to_provider_error)?;
        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Api {
                status: status.as_u16(),
                message: format!("GET {hub_url}"),
            });
        }
        let html = response.text().await.map_err(to_provider_error)?;
        Ok(harvest_links(&html, hub_url))
    }
}

fn to_provider_error(e: reqwest::Error) -> ProviderError {
    if e.is_timeout() {
        ProviderError::Timeout { ms: 0 }
    } else {
        ProviderError::Http(e.to_string())
    }
}

/// Strip markup down to readable text.
fn clean_html(html: &str) -> String {
    let no_scripts = SCRIPT_RE.replace_all(html, " ");
    let no_tags = TAG_RE.replace_all(&no_scripts, " ");
    let decoded = decode_entities(&no_tags);
    let collapsed = WS_RE.replace_all(&decoded, " ");
    collapsed.trim().chars().take(MAX_PAGE_CHARS).collect()
}

fn decode_entities(s: &str) -> String {
    s.replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ")
}

/// Harvest candidate article links from hub HTML, absolutised and deduped.
fn harvest_links(html: &str, hub_url: &str) -> Vec<ArticleLink> {
    let mut seen = std::collections::HashSet::new();
    let mut links = Vec::new();

    for cap in ANCHOR_RE.captures_iter(html) {
        let href = cap[1].trim();
        let Some(url) = absolutize(href, hub_url) else {
            continue;
        };
        if !seen.insert(url.clone()) {
            continue;
        }
        let title = WS_RE
            .replace_all(&TAG_RE.replace_all(&cap[2], " "), " ")
            .trim()
            .to_string();
        links.push(ArticleLink { url, title });
        if links.len() >= MAX_LINKS {
            break;
        }
    }
    links
}

fn absolutize(href: &str, base: &str) -> Option<String> {
    if href.starts_with("javascript:") || href.starts_with("mailto:") || href.is_empty() {
        return None;
    }
    if href.starts_with("http://") || href.starts_with("https://") {
        return Some(href.to_string());
    }
    let origin = origin(base)?;
    if let Some(rest) = href.strip_prefix("//") {
        let scheme = base.split("://").next()?;
        return Some(format!("{scheme}://{rest}"));
    }
    if href.starts_with('/') {
        return Some(format!("{origin}{href}"));
    }
    None
}

/// `scheme://host` of a URL, used for both link resolution and hub discovery.
pub(crate) fn origin(url: &str) -> Option<String> {
    let (scheme, rest) = url.split_once("://")?;
    let host = rest.split(['/', '?', '#']).next()?;
    if host.is_empty() {
        return None;
    }
    Some(format!("{scheme}://{host}"))
}
