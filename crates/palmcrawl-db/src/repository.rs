use chrono::{DateTime, Utc};
use palmcrawl_core::{Article, ArticleStore, CrawlError};
use sqlx::{Sqlite, SqliteConnection, SqlitePool};

use crate::database::db_error;

/// Repository for article persistence in the primary store.
#[derive(Clone)]
pub struct ArticleRepository {
    pool: SqlitePool,
}

impl ArticleRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Articles in one category, oldest first.
    pub async fn by_category(&self, category: &str) -> Result<Vec<Article>, CrawlError> {
        let rows = sqlx::query_as::<_, ArticleRow>(
            r#"
            SELECT url, title, content, category, scraped_date, hash
            FROM articles
            WHERE category = ?
            ORDER BY scraped_date ASC, url ASC
            "#,
        )
        .bind(category)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Article counts per category, largest first.
    pub async fn category_counts(&self) -> Result<Vec<(String, i64)>, CrawlError> {
        sqlx::query_as::<_, (String, i64)>(
            r#"
            SELECT COALESCE(category, ''), COUNT(*) AS n
            FROM articles
            GROUP BY category
            ORDER BY n DESC, 1 ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)
    }
}

// -- Internal row type for sqlx deserialization --

#[derive(sqlx::FromRow)]
pub(crate) struct ArticleRow {
    url: String,
    title: Option<String>,
    content: Option<String>,
    category: Option<String>,
    scraped_date: Option<DateTime<Utc>>,
    hash: Option<String>,
}

impl From<ArticleRow> for Article {
    fn from(row: ArticleRow) -> Self {
        Article {
            url: row.url,
            title: row.title.unwrap_or_default(),
            content: row.content.unwrap_or_default(),
            category: row.category.unwrap_or_default(),
            scraped_at: row.scraped_date.unwrap_or_default(),
            content_hash: row.hash.unwrap_or_default(),
        }
    }
}

/// Insert or replace `article` by url on `conn`.
///
/// Shared with the category mirror, whose stores use the same `articles`
/// table layout.
pub(crate) async fn replace_article(
    conn: &mut SqliteConnection,
    article: &Article,
) -> Result<(), sqlx::Error> {
    sqlx::query::<Sqlite>(
        r#"
        INSERT OR REPLACE INTO articles (url, title, content, category, scraped_date, hash)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&article.url)
    .bind(&article.title)
    .bind(&article.content)
    .bind(&article.category)
    .bind(article.scraped_at)
    .bind(&article.content_hash)
    .execute(conn)
    .await?;
    Ok(())
}

impl ArticleStore for ArticleRepository {
    async fn upsert(&self, article: &Article) -> Result<(), CrawlError> {
        // One statement, so the hash check and the write share a lock
        let result = sqlx::query(
            r#"
            INSERT OR REPLACE INTO articles (url, title, content, category, scraped_date, hash)
            SELECT ?, ?, ?, ?, ?, ?
            WHERE NOT EXISTS (SELECT 1 FROM articles WHERE hash = ? AND url <> ?)
            "#,
        )
        .bind(&article.url)
        .bind(&article.title)
        .bind(&article.content)
        .bind(&article.category)
        .bind(article.scraped_at)
        .bind(&article.content_hash)
        .bind(&article.content_hash)
        .bind(&article.url)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        if result.rows_affected() == 0 {
            let existing_url: Option<String> =
                sqlx::query_scalar("SELECT url FROM articles WHERE hash = ? AND url <> ?")
                    .bind(&article.content_hash)
                    .bind(&article.url)
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(db_error)?;
            return Err(CrawlError::ConstraintViolation {
                hash: article.content_hash.clone(),
                url: article.url.clone(),
                existing_url: existing_url.unwrap_or_default(),
            });
        }
        Ok(())
    }

    async fn exists_by_hash(&self, hash: &str) -> Result<bool, CrawlError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM articles WHERE hash = ?")
            .bind(hash)
            .fetch_one(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(count > 0)
    }

    async fn hash_held_elsewhere(&self, hash: &str, url: &str) -> Result<bool, CrawlError> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM articles WHERE hash = ? AND url <> ?")
                .bind(hash)
                .bind(url)
                .fetch_one(&self.pool)
                .await
                .map_err(db_error)?;
        Ok(count > 0)
    }

    async fn count(&self) -> Result<i64, CrawlError> {
        sqlx::query_scalar("SELECT COUNT(*) FROM articles")
            .fetch_one(&self.pool)
            .await
            .map_err(db_error)
    }

    async fn enumerate(&self, limit: Option<usize>) -> Result<Vec<Article>, CrawlError> {
        // SQLite treats a negative LIMIT as unbounded
        let limit = limit.map_or(-1, |n| n as i64);
        let rows = sqlx::query_as::<_, ArticleRow>(
            r#"
            SELECT url, title, content, category, scraped_date, hash
            FROM articles
            ORDER BY scraped_date ASC, url ASC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}
