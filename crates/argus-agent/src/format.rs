//! Reply post-processing for a mobile messaging surface.

use std::sync::LazyLock;

use regex::Regex;

static THINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<think>.*?</think>").unwrap());
static SPACES_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[ \t]+").unwrap());
static BLANK_LINES_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").unwrap());

/// Remove chain-of-thought segments some models leak into output.
pub fn strip_think(text: &str) -> String {
    THINK_RE.replace_all(text, "").into_owned()
}

/// Collapse horizontal whitespace runs and excess blank lines.
pub fn collapse_whitespace(text: &str) -> String {
    let no_cr = text.replace('\r', "");
    let spaces = SPACES_RE.replace_all(&no_cr, " ");
    BLANK_LINES_RE.replace_all(&spaces, "\n\n").trim().to_string()
}

/// Soft word cap: overlong replies are truncated with an ellipsis.
pub fn enforce_word_cap(text: &str, cap: usize) -> String {
    if cap == 0 {
        return text.to_string();
    }
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.len() <= cap {
        return text.to_string();
    }
    format!("{}…", words[..cap].join(" "))
}

/// Full pipeline applied to every user-visible reply.
pub fn postprocess(text: &str, word_cap: usize) -> String {
    enforce_word_cap(&collapse_whitespace(&strip_think(text)), word_cap)
}
