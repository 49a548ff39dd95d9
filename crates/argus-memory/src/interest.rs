//! Two-tier interest extraction over the short-term context.
//!
//! The fast path is a pure regex pass that only fires when the message
//! carries an explicit intent prefix, so "I hate news" tags nothing.
//! The deep path asks the LLM to refine the full tag set and replaces it
//! wholesale on a clean parse.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use argus_core::provider::TextCompleter;

use crate::types::ConversationMessage;

/// A message must contain one of these before any keyword is considered.
const INTENT_PREFIXES: [&str; 7] = [
    "i like",
    "i love",
    "interested in",
    "tell me about",
    "news about",
    "updates on",
    "looking for",
];

const CATEGORY_KEYWORDS: [(&str, &[&str]); 5] = [
    (
        "tech",
        &["tech", "technology", "programming", "coding", "ai", "software"],
    ),
    (
        "finance",
        &["business", "finance", "stock", "market", "economy", "crypto"],
    ),
    (
        "sports",
        &["sports", "football", "basketball", "soccer", "game"],
    ),
    ("news", &["news", "headlines", "events", "world"]),
    ("science", &["science", "space", "biology", "physics"]),
];

/// One word-boundary alternation per category, compiled once.
static CATEGORY_PATTERNS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    CATEGORY_KEYWORDS
        .iter()
        .map(|(category, keywords)| {
            let pattern = format!(r"\b(?:{})\b", keywords.join("|"));
            (*category, Regex::new(&pattern).expect("static keyword pattern"))
        })
        .collect()
});

/// Fast heuristic tagging. Returns the categories mentioned with intent,
/// or an empty set when no intent prefix is present.
pub fn extract_fast(text: &str) -> BTreeSet<String> {
    let lower = text.to_lowercase();
    if !INTENT_PREFIXES.iter().any(|p| lower.contains(p)) {
        return BTreeSet::new();
    }

    CATEGORY_PATTERNS
        .iter()
        .filter(|(_, re)| re.is_match(&lower))
        .map(|(category, _)| category.to_string())
        .collect()
}

/// Deep LLM refinement of the tag set.
///
/// Returns `None` on any provider or parse failure so the caller preserves
/// the existing tags.
pub async fn refresh_deep(
    completer: &dyn TextCompleter,
    recent: &[ConversationMessage],
    current: &BTreeSet<String>,
) -> Option<BTreeSet<String>> {
    let transcript: String = recent
        .iter()
        .map(|m| format!("{}: {}\n", m.role, m.content))
        .collect();
    let current_tags: Vec<&str> = current.iter().map(String::as_str).collect();

    let system = "You maintain a set of topical interest tags for a chat user. \
                  Respond with ONLY a JSON array of short lowercase tags, \
                  e.g. [\"tech\", \"finance\"]. No prose.";
    let user = format!(
        "Current tags: {}\n\nRecent conversation:\n{}\n\nReturn the refined tag list.",
        serde_json::to_string(&current_tags).unwrap_or_else(|_| "[]".into()),
        transcript
    );

    let response = match completer.complete(system, &user).await {
        Ok(r) => r,
        Err(e) => {
            debug!(error = %e, "deep interest analysis failed");
            return None;
        }
    };

    parse_tag_array(&response)
}

/// Extract a JSON array of strings from an LLM response that may wrap it
/// in prose or code fences.
fn parse_tag_array(response: &str) -> Option<BTreeSet<String>> {
    let start = response.find('[')?;
    let end = response.rfind(']')?;
    if end <= start {
        return None;
    }
    let tags: Vec<String> = serde_json::from_str(&response[start..=end]).ok()?;
    Some(tags.into_iter().map(|t| t.trim().to_lowercase()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_intent_prefix_tags_nothing() {
        assert!(extract_fast("I hate news").is_empty());
        assert!(extract_fast("the stock market crashed").is_empty());
    }

    #[test]
    fn intent_plus_keyword_tags_category() {
        let tags = extract_fast("I love ai and tech");
        assert!(tags.contains("tech"));
        assert_eq!(tags.len(), 1);
    }

    #[test]
    fn multiple_categories_in_one_message() {
        let tags = extract_fast("tell me about crypto and football");
        assert!(tags.contains("finance"));
        assert!(tags.contains("sports"));
    }

    #[test]
    fn keyword_match_respects_word_boundaries() {
        // "air" must not trigger the "ai" keyword.
        assert!(extract_fast("i like fresh air").is_empty());
    }

    #[test]
    fn intent_prefix_is_case_insensitive() {
        assert!(extract_fast("Tell Me About space").contains("science"));
    }

    #[test]
    fn parses_fenced_tag_array() {
        let tags = parse_tag_array("```json\n[\"Tech\", \"news\"]\n```").unwrap();
        assert!(tags.contains("tech"));
        assert!(tags.contains("news"));
    }

    #[test]
    fn garbage_response_parses_to_none() {
        assert!(parse_tag_array("sorry, I can't help with that").is_none());
        assert!(parse_tag_array("] backwards [").is_none());
    }
}
