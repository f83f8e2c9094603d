use std::fmt;

use thiserror::Error;

/// Crawl-wide error types for palmcrawl.
#[derive(Error, Debug)]
pub enum CrawlError {
    /// HTTP request failed or returned a non-2xx status.
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// Network/connection error.
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Request timed out.
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    /// Page body could not be turned into text and links.
    #[error("Parse error: {0}")]
    ParseError(String),

    /// A content hash is already held by a different url.
    ///
    /// The quality gate rejects duplicates before storing, so seeing this
    /// means the gate and the store disagree.
    #[error("Constraint violation: hash {hash} of {url} already stored for {existing_url}")]
    ConstraintViolation {
        hash: String,
        url: String,
        existing_url: String,
    },

    /// Database operation failed.
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// Invalid or missing configuration.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// JSON serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Filesystem error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CrawlError {
    /// Returns true for errors raised while fetching a page.
    ///
    /// These skip the url for the rest of the run and are never retried.
    pub fn is_fetch_error(&self) -> bool {
        matches!(
            self,
            CrawlError::HttpError(_) | CrawlError::NetworkError(_) | CrawlError::Timeout(_)
        )
    }

    /// Returns true if the run must stop.
    pub fn is_fatal(&self) -> bool {
        matches!(self, CrawlError::DatabaseError(_) | CrawlError::Io(_))
    }
}

/// Why the quality gate refused a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum RejectReason {
    /// Detected language is not the target language.
    Language,
    /// Another article already carries the same content hash.
    Duplicate,
    /// Host is not on the reputable-domain allow-list.
    Source,
    /// Normalized content is below the minimum length.
    Short,
}

impl RejectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectReason::Language => "Language",
            RejectReason::Duplicate => "Duplicate",
            RejectReason::Source => "Source",
            RejectReason::Short => "Short",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
