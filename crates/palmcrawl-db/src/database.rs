use std::path::Path;
use std::time::Duration;

use palmcrawl_core::{AllowList, CrawlError};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};

use crate::config::DatabaseConfig;
use crate::frontier::SqliteFrontier;
use crate::repository::ArticleRepository;

/// Connect options shared by the primary and category stores.
pub(crate) fn connect_options(path: &Path, create: bool) -> SqliteConnectOptions {
    SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(create)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .busy_timeout(Duration::from_secs(5))
        .foreign_keys(false)
}

pub(crate) fn db_error(e: sqlx::Error) -> CrawlError {
    CrawlError::DatabaseError(e.to_string())
}

/// Central database facade: owns the primary store's pool, runs migrations,
/// and vends repository instances.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (creating if needed) the SQLite file named by `config`.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, CrawlError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(connect_options(&config.path, true))
            .await
            .map_err(|e| {
                CrawlError::DatabaseError(format!(
                    "Failed to open {}: {e}",
                    config.path.display()
                ))
            })?;

        Ok(Self { pool })
    }

    /// Run all pending migrations.
    pub async fn migrate(&self) -> Result<(), CrawlError> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| CrawlError::DatabaseError(format!("Migration failed: {e}")))?;
        Ok(())
    }

    /// Get a [`SqliteFrontier`] admitting links from `allow_list`.
    pub fn frontier(&self, allow_list: AllowList) -> SqliteFrontier {
        SqliteFrontier::new(self.pool.clone(), allow_list)
    }

    /// Get an [`ArticleRepository`] backed by this pool.
    pub fn articles(&self) -> ArticleRepository {
        ArticleRepository::new(self.pool.clone())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}
