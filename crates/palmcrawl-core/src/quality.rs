use crate::domain::AllowList;
use crate::error::{CrawlError, RejectReason};
use crate::models::compute_hash;
use crate::traits::{ArticleStore, LanguageDetector};

/// Outcome of a quality assessment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Page may be stored under this content hash.
    Accept { content_hash: String },
    Reject(RejectReason),
}

/// Admits or rejects a fetched, normalized page.
///
/// Checks run in a fixed order and the first failure wins: language,
/// duplicate content, source credibility, length.
#[derive(Clone)]
pub struct QualityGate<S, L>
where
    S: ArticleStore,
    L: LanguageDetector,
{
    store: S,
    detector: L,
    allow_list: AllowList,
    target_language: String,
    min_content_length: usize,
}

impl<S, L> QualityGate<S, L>
where
    S: ArticleStore,
    L: LanguageDetector,
{
    pub fn new(
        store: S,
        detector: L,
        allow_list: AllowList,
        target_language: impl Into<String>,
        min_content_length: usize,
    ) -> Self {
        Self {
            store,
            detector,
            allow_list,
            target_language: target_language.into(),
            min_content_length,
        }
    }

    /// Assess a page. Only store lookups can fail.
    pub async fn assess(&self, url: &str, content: &str) -> Result<Verdict, CrawlError> {
        // An undetectable language passes; short or mixed pages are common.
        if let Some(lang) = self.detector.detect(content) {
            if !lang.eq_ignore_ascii_case(&self.target_language) {
                tracing::info!(%url, %lang, "Flagged: non-target language");
                return Ok(Verdict::Reject(RejectReason::Language));
            }
        }

        // A url's own stored row is not a duplicate; it is refetched on resume
        let content_hash = compute_hash(content);
        if self.store.hash_held_elsewhere(&content_hash, url).await? {
            tracing::info!(%url, hash = %&content_hash[..8], "Flagged: duplicate content");
            return Ok(Verdict::Reject(RejectReason::Duplicate));
        }

        if !self.allow_list.allows_url(url) {
            tracing::info!(%url, "Flagged: low credibility domain");
            return Ok(Verdict::Reject(RejectReason::Source));
        }

        let length = content.chars().count();
        if length < self.min_content_length {
            tracing::info!(%url, %length, "Flagged: too short");
            return Ok(Verdict::Reject(RejectReason::Short));
        }

        Ok(Verdict::Accept { content_hash })
    }
}
