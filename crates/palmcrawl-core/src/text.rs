use std::sync::LazyLock;

use regex::Regex;

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));
static DISALLOWED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\s.,!?]").expect("valid regex"));

/// Normalize extracted page text for classification and hashing.
///
/// Collapses whitespace runs to a single space, drops everything that is not
/// a word character, whitespace or `.,!?`, trims and lowercases.
pub fn normalize_text(raw: &str) -> String {
    let collapsed = WHITESPACE.replace_all(raw, " ");
    let stripped = DISALLOWED.replace_all(&collapsed, "");
    stripped.trim().to_lowercase()
}
