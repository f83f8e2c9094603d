use std::collections::HashSet;

use chrono::Utc;
use palmcrawl_core::domain::canonicalize;
use palmcrawl_core::{AllowList, CrawlError, Frontier, FrontierEntry};
use sqlx::{Sqlite, SqlitePool, Transaction};

use crate::database::db_error;

/// SQLite-backed crawl frontier.
///
/// `pending_urls` is the FIFO queue (ordered by id) and `visited_urls` the
/// visited set. Claims are leases: `pop` stamps `leased_at` in a single
/// `UPDATE ... RETURNING`, and the row is only deleted when the url is
/// marked visited.
#[derive(Clone)]
pub struct SqliteFrontier {
    pool: SqlitePool,
    allow_list: AllowList,
}

impl SqliteFrontier {
    pub fn new(pool: SqlitePool, allow_list: AllowList) -> Self {
        Self { pool, allow_list }
    }

    /// Enqueue `url` at `depth` unless it is pending or visited.
    async fn enqueue(
        tx: &mut Transaction<'static, Sqlite>,
        url: &str,
        depth: u32,
    ) -> Result<bool, CrawlError> {
        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO pending_urls (url, depth)
            SELECT ?, ?
            WHERE NOT EXISTS (SELECT 1 FROM visited_urls WHERE url = ?)
            "#,
        )
        .bind(url)
        .bind(depth as i64)
        .bind(url)
        .execute(&mut **tx)
        .await
        .map_err(db_error)?;

        Ok(result.rows_affected() > 0)
    }

    /// Pending urls in queue order, claimed ones included.
    pub async fn pending(&self) -> Result<Vec<FrontierEntry>, CrawlError> {
        let rows: Vec<(i64, String, i64)> =
            sqlx::query_as("SELECT id, url, depth FROM pending_urls ORDER BY id ASC")
                .fetch_all(&self.pool)
                .await
                .map_err(db_error)?;

        Ok(rows.into_iter().map(entry_from_row).collect())
    }
}

fn entry_from_row((id, url, depth): (i64, String, i64)) -> FrontierEntry {
    FrontierEntry {
        id,
        url,
        depth: depth.max(0) as u32,
    }
}

impl Frontier for SqliteFrontier {
    async fn seed(&self, urls: &[String]) -> Result<usize, CrawlError> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;
        let mut added = 0;
        for url in urls.iter().filter_map(|u| canonicalize(u)) {
            if Self::enqueue(&mut tx, &url, 0).await? {
                added += 1;
            }
        }
        tx.commit().await.map_err(db_error)?;
        Ok(added)
    }

    async fn pop(&self) -> Result<Option<FrontierEntry>, CrawlError> {
        let row: Option<(i64, String, i64)> = sqlx::query_as(
            r#"
            UPDATE pending_urls
            SET leased_at = ?
            WHERE id = (
                SELECT id FROM pending_urls
                WHERE leased_at IS NULL
                ORDER BY id ASC
                LIMIT 1
            )
            RETURNING id, url, depth
            "#,
        )
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(row.map(entry_from_row))
    }

    async fn admit_links(
        &self,
        urls: &[String],
        parent_depth: u32,
        max_depth: u32,
    ) -> Result<usize, CrawlError> {
        let depth = parent_depth + 1;
        if depth > max_depth {
            return Ok(0);
        }

        let mut seen = HashSet::new();
        let candidates: Vec<String> = urls
            .iter()
            .filter_map(|u| canonicalize(u))
            .filter(|u| self.allow_list.allows_url(u))
            .filter(|u| seen.insert(u.clone()))
            .collect();
        if candidates.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await.map_err(db_error)?;
        let mut added = 0;
        for url in &candidates {
            if Self::enqueue(&mut tx, url, depth).await? {
                added += 1;
            }
        }
        tx.commit().await.map_err(db_error)?;
        Ok(added)
    }

    async fn mark_visited(&self, url: &str) -> Result<(), CrawlError> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;
        sqlx::query("INSERT OR IGNORE INTO visited_urls (url, visited_at) VALUES (?, ?)")
            .bind(url)
            .bind(Utc::now())
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;
        sqlx::query("DELETE FROM pending_urls WHERE url = ?")
            .bind(url)
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;
        tx.commit().await.map_err(db_error)?;
        Ok(())
    }

    async fn is_visited(&self, url: &str) -> Result<bool, CrawlError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM visited_urls WHERE url = ?")
            .bind(url)
            .fetch_one(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(count > 0)
    }

    async fn release_leases(&self) -> Result<u64, CrawlError> {
        let result =
            sqlx::query("UPDATE pending_urls SET leased_at = NULL WHERE leased_at IS NOT NULL")
                .execute(&self.pool)
                .await
                .map_err(db_error)?;
        Ok(result.rows_affected())
    }

    async fn pending_count(&self) -> Result<i64, CrawlError> {
        sqlx::query_scalar("SELECT COUNT(*) FROM pending_urls")
            .fetch_one(&self.pool)
            .await
            .map_err(db_error)
    }

    async fn visited_count(&self) -> Result<i64, CrawlError> {
        sqlx::query_scalar("SELECT COUNT(*) FROM visited_urls")
            .fetch_one(&self.pool)
            .await
            .map_err(db_error)
    }
}
