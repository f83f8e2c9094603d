use std::future::Future;

use crate::error::CrawlError;
use crate::models::Article;

/// Fetches the raw body of a page.
pub trait Fetcher: Send + Sync + Clone {
    fn fetch(&self, url: &str) -> impl Future<Output = Result<String, CrawlError>> + Send;
}

/// Title, visible text and outbound links of a fetched page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedPage {
    pub title: String,
    /// Visible text, not yet normalized.
    pub text: String,
    /// Absolute, fragment-free http(s) links in document order.
    pub links: Vec<String>,
}

/// Turns a fetched body into text and links.
pub trait PageParser: Send + Sync + Clone {
    fn parse(&self, url: &str, body: &str) -> Result<ParsedPage, CrawlError>;
}

/// Detects the language of a text.
pub trait LanguageDetector: Send + Sync + Clone {
    /// ISO 639-1 code, or `None` when detection is unreliable.
    fn detect(&self, text: &str) -> Option<String>;
}

/// Durable, url-keyed article store.
///
/// Implementations must reject an article whose hash is already held by a
/// different url with [`CrawlError::ConstraintViolation`].
pub trait ArticleStore: Send + Sync + Clone {
    /// Insert or replace by url.
    fn upsert(&self, article: &Article) -> impl Future<Output = Result<(), CrawlError>> + Send;

    fn exists_by_hash(&self, hash: &str)
    -> impl Future<Output = Result<bool, CrawlError>> + Send;

    /// Whether a url other than `url` already holds `hash`.
    fn hash_held_elsewhere(
        &self,
        hash: &str,
        url: &str,
    ) -> impl Future<Output = Result<bool, CrawlError>> + Send;

    fn count(&self) -> impl Future<Output = Result<i64, CrawlError>> + Send;

    /// Stored articles, oldest first.
    fn enumerate(
        &self,
        limit: Option<usize>,
    ) -> impl Future<Output = Result<Vec<Article>, CrawlError>> + Send;
}

/// Best-effort secondary write of articles into per-category stores.
pub trait CategoryMirror: Send + Sync {
    /// Write the article into its category store. Returns the store's slug.
    fn mirror(
        &self,
        article: &Article,
    ) -> impl Future<Output = Result<Option<String>, CrawlError>> + Send;

    /// Close every opened category store.
    fn close(&self) -> impl Future<Output = ()> + Send;
}

/// `None` disables mirroring.
impl<M: CategoryMirror> CategoryMirror for Option<M> {
    async fn mirror(&self, article: &Article) -> Result<Option<String>, CrawlError> {
        match self {
            Some(mirror) => mirror.mirror(article).await,
            None => Ok(None),
        }
    }

    async fn close(&self) {
        if let Some(mirror) = self {
            mirror.close().await;
        }
    }
}
