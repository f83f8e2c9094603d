//! Category naming helpers shared by the crawl mirror and the splitter.

use std::sync::LazyLock;

use regex::Regex;

use crate::models::UNCATEGORIZED;

/// Column names treated as category-like, in priority order (case-insensitive).
pub const CANDIDATE_CATEGORY_COLUMNS: &[&str] = &[
    "category",
    "categories",
    "cat",
    "tag",
    "tags",
    "topic",
    "topics",
    "label",
    "labels",
    "type",
    "types",
    "genre",
];

/// Longest slug used for a category store file name.
pub const MAX_SLUG_LEN: usize = 200;

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));
static RESERVED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[\\/:*?"<>|\x00-\x1f]+"#).expect("valid regex"));
static SEPARATORS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[,|;/]").expect("valid regex"));

/// Label for a possibly blank category.
pub fn category_or_default(category: &str) -> &str {
    let trimmed = category.trim();
    if trimmed.is_empty() {
        UNCATEGORIZED
    } else {
        trimmed
    }
}

/// File-safe slug for a category name.
///
/// Whitespace runs become `_`, characters that are unsafe in file names
/// become `_`, the result is capped at [`MAX_SLUG_LEN`] characters and a
/// blank name maps to `Uncategorized`.
pub fn sanitize_slug(name: &str) -> String {
    let name = category_or_default(name);
    let spaced = WHITESPACE.replace_all(name, "_");
    let safe = RESERVED.replace_all(&spaced, "_");
    safe.chars().take(MAX_SLUG_LEN).collect()
}

/// Find the category-like column among `columns`.
///
/// Candidates are tried in [`CANDIDATE_CATEGORY_COLUMNS`] order; the column's
/// original spelling is returned.
pub fn find_category_column<S: AsRef<str>>(columns: &[S]) -> Option<String> {
    CANDIDATE_CATEGORY_COLUMNS.iter().find_map(|candidate| {
        columns
            .iter()
            .map(AsRef::as_ref)
            .find(|col| col.eq_ignore_ascii_case(candidate))
            .map(str::to_string)
    })
}

/// Split a raw category cell into individual category names.
///
/// A JSON array yields its non-blank elements, a string containing any of
/// `,|;/` is split on them, anything else is a single category. Blank input
/// yields an empty list; callers map that to `Uncategorized`.
pub fn extract_categories(raw: &str) -> Vec<String> {
    let s = raw.trim();
    if s.is_empty() {
        return Vec::new();
    }

    if s.starts_with('[') && s.ends_with(']') {
        if let Ok(serde_json::Value::Array(items)) = serde_json::from_str::<serde_json::Value>(s) {
            return items
                .into_iter()
                .filter_map(|item| match item {
                    serde_json::Value::Null => None,
                    serde_json::Value::String(text) => Some(text.trim().to_string()),
                    other => Some(other.to_string().trim().to_string()),
                })
                .filter(|item| !item.is_empty())
                .collect();
        }
    }

    if SEPARATORS.is_match(s) {
        return SEPARATORS
            .split(s)
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(str::to_string)
            .collect();
    }

    vec![s.to_string()]
}

/// Like [`extract_categories`], but never empty.
pub fn categories_or_default(raw: Option<&str>) -> Vec<String> {
    let categories = raw.map(extract_categories).unwrap_or_default();
    if categories.is_empty() {
        vec![UNCATEGORIZED.to_string()]
    } else {
        categories
    }
}
