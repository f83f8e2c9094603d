use std::collections::HashSet;
use std::path::{Path, PathBuf};

use palmcrawl_core::{Article, CategoryMirror, CrawlError};
use tokio::sync::Mutex;

use crate::database::db_error;
use crate::registry::CategoryStoreRegistry;
use crate::repository::replace_article;

/// `articles` layout of a category store; matches the primary store.
const ARTICLES_DDL: &str = r#"
CREATE TABLE IF NOT EXISTS articles (
    url TEXT PRIMARY KEY,
    title TEXT,
    content TEXT,
    category TEXT,
    scraped_date TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
    hash TEXT UNIQUE
)
"#;

struct MirrorState {
    registry: CategoryStoreRegistry,
    /// Slugs whose `articles` table exists.
    ready: HashSet<String>,
}

/// Copies accepted articles into one SQLite file per category.
///
/// Each write is independent of the primary store's: a failure here is
/// returned to the caller and never undoes the primary upsert.
pub struct SqliteCategoryMirror {
    state: Mutex<MirrorState>,
}

impl SqliteCategoryMirror {
    /// Mirror into `<dir>/<slug>.db`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            state: Mutex::new(MirrorState {
                registry: CategoryStoreRegistry::new(dir),
                ready: HashSet::new(),
            }),
        }
    }

    /// Mirror next to the primary store file.
    pub fn beside(primary_db: &Path) -> Self {
        let dir = primary_db
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        Self::new(dir)
    }
}

impl CategoryMirror for SqliteCategoryMirror {
    async fn mirror(&self, article: &Article) -> Result<Option<String>, CrawlError> {
        let store = {
            let mut state = self.state.lock().await;
            let store = state.registry.open(&article.category).await?;
            if !state.ready.contains(&store.slug) {
                sqlx::query(ARTICLES_DDL)
                    .execute(&store.pool)
                    .await
                    .map_err(db_error)?;
                state.ready.insert(store.slug.clone());
            }
            store
        };

        let mut conn = store.pool.acquire().await.map_err(db_error)?;
        replace_article(&mut *conn, article).await.map_err(db_error)?;
        tracing::debug!(url = %article.url, slug = %store.slug, "Mirrored article");
        Ok(Some(store.slug))
    }

    async fn close(&self) {
        let mut state = self.state.lock().await;
        state.registry.close_all().await;
        state.ready.clear();
    }
}
