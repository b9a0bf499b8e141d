//! Inbound text sanitization.
//!
//! Confessions and comments pass through the same pipeline before storage or
//! comparison: script/style blocks go first (content included), then
//! `javascript:` URIs and inline event-handler attributes, then every
//! remaining tag. Hashtags are scanned from the sanitized text.

use std::sync::LazyLock;

use regex::Regex;

static SCRIPT_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<script\b.*?</script\s*>").expect("valid regex"));

static STYLE_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<style\b.*?</style\s*>").expect("valid regex"));

static JS_URI: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)javascript:").expect("valid regex"));

static EVENT_ATTR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\bon\w+\s*=\s*("[^"]*"|'[^']*'|[^\s>]+)"#).expect("valid regex")
});

static ANY_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").expect("valid regex"));

static HASHTAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"#[A-Za-z0-9_]+").expect("valid regex"));

pub fn sanitize_input(text: &str) -> String {
    let mut sanitized = SCRIPT_BLOCK.replace_all(text, "").into_owned();
    sanitized = STYLE_BLOCK.replace_all(&sanitized, "").into_owned();
    sanitized = JS_URI.replace_all(&sanitized, "").into_owned();
    sanitized = EVENT_ATTR.replace_all(&sanitized, "").into_owned();
    sanitized = ANY_TAG.replace_all(&sanitized, "").into_owned();
    sanitized.trim().to_string()
}

/// `#[A-Za-z0-9_]+` scan: order preserved, duplicates kept.
pub fn extract_hashtags(text: &str) -> Vec<String> {
    HASHTAG
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect()
}
