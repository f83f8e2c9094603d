use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

/// Category label used when no keyword matched or the category is blank.
pub const UNCATEGORIZED: &str = "Uncategorized";

/// A pending `(url, depth)` pair in the crawl frontier.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct FrontierEntry {
    /// Insertion sequence; pops follow it strictly.
    pub id: i64,
    pub url: String,
    pub depth: u32,
}

/// An accepted, classified page.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Article {
    pub url: String,
    pub title: String,
    /// Normalized text the classifier and the gate saw.
    pub content: String,
    pub category: String,
    pub scraped_at: DateTime<Utc>,
    /// SHA-256 of `content`
    pub content_hash: String,
}

impl Article {
    pub fn new(
        url: impl Into<String>,
        title: impl Into<String>,
        content: impl Into<String>,
        category: impl Into<String>,
        content_hash: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            content: content.into(),
            category: category.into(),
            scraped_at: Utc::now(),
            content_hash: content_hash.into(),
        }
    }
}

/// Compute a SHA-256 hash of a string, returned as 64-char hex.
pub fn compute_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}
