use std::path::Path;

use palmcrawl_core::{AllowList, Article, compute_hash};
use palmcrawl_db::{Database, DatabaseConfig};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tempfile::TempDir;

/// Opens a migrated primary store in a fresh temp directory.
///
/// The `TempDir` must be kept in scope for the test duration; dropping it
/// removes the database file.
pub async fn setup_test_db() -> (Database, TempDir) {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let config = DatabaseConfig::new(dir.path().join("palmcrawl.db")).with_max_connections(4);
    let db = Database::connect(&config)
        .await
        .expect("Failed to open database");
    db.migrate().await.expect("Failed to run migrations");
    (db, dir)
}

pub fn allow_list() -> AllowList {
    AllowList::new(["example.org", "news.example.com"])
}

pub fn article(url: &str, category: &str, content: &str) -> Article {
    Article::new(
        url,
        format!("Title of {url}"),
        content,
        category,
        compute_hash(content),
    )
}

/// Plain pool on an arbitrary SQLite file, for building split sources.
pub async fn open_raw(path: &Path) -> SqlitePool {
    SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(SqliteConnectOptions::new().filename(path).create_if_missing(true))
        .await
        .expect("Failed to open sqlite file")
}

pub async fn count_rows(path: &Path, table: &str) -> i64 {
    let pool = open_raw(path).await;
    let n = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM \"{table}\""))
        .fetch_one(&pool)
        .await
        .expect("Failed to count rows");
    pool.close().await;
    n
}
