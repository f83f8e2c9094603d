use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};

use palmcrawl_core::CrawlError;
use palmcrawl_core::category::{category_or_default, sanitize_slug};
use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;

use crate::database::connect_options;

/// An opened per-category store.
#[derive(Debug, Clone)]
pub struct CategoryStore {
    pub slug: String,
    pub path: PathBuf,
    pub pool: SqlitePool,
}

/// Lazily opened per-category SQLite stores, keyed by slug.
///
/// Owned by whichever component writes the category stores for a run (the
/// mirror or the splitter) and closed when that run ends.
#[derive(Debug)]
pub struct CategoryStoreRegistry {
    dir: PathBuf,
    stores: HashMap<String, CategoryStore>,
}

impl CategoryStoreRegistry {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            stores: HashMap::new(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File a category's store lives in, whether opened or not.
    pub fn path_for(&self, category: &str) -> PathBuf {
        self.dir
            .join(format!("{}.db", sanitize_slug(category_or_default(category))))
    }

    /// Open the store for `category`, creating the file on first use.
    ///
    /// Categories that sanitize to the same slug share one store.
    pub async fn open(&mut self, category: &str) -> Result<CategoryStore, CrawlError> {
        let slug = sanitize_slug(category_or_default(category));
        if let Some(store) = self.stores.get(&slug) {
            return Ok(store.clone());
        }

        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.dir.join(format!("{slug}.db"));
        // One writer connection per store; batches hold it for a transaction
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(connect_options(&path, true))
            .await
            .map_err(|e| {
                CrawlError::DatabaseError(format!("Failed to open {}: {e}", path.display()))
            })?;
        tracing::debug!(%slug, path = %path.display(), "Opened category store");

        let store = CategoryStore { slug, path, pool };
        self.stores.insert(store.slug.clone(), store.clone());
        Ok(store)
    }

    pub fn len(&self) -> usize {
        self.stores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stores.is_empty()
    }

    /// Opened stores by slug.
    pub fn paths(&self) -> BTreeMap<String, PathBuf> {
        self.stores
            .values()
            .map(|s| (s.slug.clone(), s.path.clone()))
            .collect()
    }

    /// Close every opened store. The registry can be reused afterwards.
    pub async fn close_all(&mut self) {
        for (slug, store) in self.stores.drain() {
            store.pool.close().await;
            tracing::debug!(%slug, "Closed category store");
        }
    }
}

/// Tables already created per category store, keyed by (slug, table).
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    created: HashSet<(String, String)>,
}

impl SchemaRegistry {
    pub fn is_created(&self, slug: &str, table: &str) -> bool {
        self.created
            .contains(&(slug.to_string(), table.to_string()))
    }

    pub fn mark_created(&mut self, slug: &str, table: &str) {
        self.created.insert((slug.to_string(), table.to_string()));
    }

    pub fn len(&self) -> usize {
        self.created.len()
    }

    pub fn is_empty(&self) -> bool {
        self.created.is_empty()
    }
}
