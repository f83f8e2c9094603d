use std::path::{Path, PathBuf};

use palmcrawl_core::{ArticleStore, CrawlError};
use palmcrawl_db::CategorySplitter;

use crate::integration::common::{article, count_rows, open_raw, setup_test_db};

/// Source with one categorized table, one tagged table and one plain table.
async fn build_source(dir: &Path) -> PathBuf {
    let path = dir.join("source.db");
    let pool = open_raw(&path).await;

    for statement in [
        "CREATE TABLE articles (url TEXT PRIMARY KEY, title TEXT, category TEXT, score REAL, payload BLOB)",
        "CREATE TABLE snippets (body TEXT, Topic TEXT)",
        "CREATE TABLE notes (id INTEGER PRIMARY KEY, body TEXT)",
    ] {
        sqlx::query(statement).execute(&pool).await.unwrap();
    }

    let rows: [(&str, &str, Option<&str>, f64); 4] = [
        ("https://example.org/a", "A", Some("Market Trends, Processing"), 0.5),
        ("https://example.org/b", "B", Some("Processing"), 1.5),
        ("https://example.org/c", "C", None, 2.5),
        ("https://example.org/d", "D", Some(r#"["Cultivation", "Processing"]"#), 3.5),
    ];
    for (url, title, category, score) in rows {
        sqlx::query("INSERT INTO articles VALUES (?, ?, ?, ?, ?)")
            .bind(url)
            .bind(title)
            .bind(category)
            .bind(score)
            .bind(url.as_bytes())
            .execute(&pool)
            .await
            .unwrap();
    }

    sqlx::query("INSERT INTO snippets VALUES ('mill effluent', 'Processing'), ('fertilizer', '')")
        .execute(&pool)
        .await
        .unwrap();
    sqlx::query("INSERT INTO notes (body) VALUES ('plain'), ('rows')")
        .execute(&pool)
        .await
        .unwrap();

    pool.close().await;
    path
}

#[tokio::test]
async fn fans_rows_out_per_category() {
    let dir = tempfile::tempdir().unwrap();
    let source = build_source(dir.path()).await;
    let out = dir.path().join("split");

    let report = CategorySplitter::new(&out).run(&source).await.unwrap();

    assert_eq!(report.tables_processed, vec!["articles", "snippets"]);
    assert_eq!(report.tables_skipped.len(), 1);
    assert_eq!(report.tables_skipped[0].0, "notes");
    assert_eq!(report.rows_read, 6);
    assert_eq!(report.failed_rows, 0);

    assert_eq!(count_rows(&out.join("Market_Trends.db"), "articles").await, 1);
    assert_eq!(count_rows(&out.join("Processing.db"), "articles").await, 3);
    assert_eq!(count_rows(&out.join("Cultivation.db"), "articles").await, 1);
    assert_eq!(count_rows(&out.join("Uncategorized.db"), "articles").await, 1);
    assert_eq!(count_rows(&out.join("Processing.db"), "snippets").await, 1);
    assert_eq!(count_rows(&out.join("Uncategorized.db"), "snippets").await, 1);

    assert_eq!(report.rows_by_category["Processing"], 4);
    assert_eq!(report.rows_by_table["Processing"]["articles"], 3);
    assert_eq!(report.rows_written(), 8);
    assert_eq!(
        report.outputs.keys().collect::<Vec<_>>(),
        vec!["Cultivation", "Market_Trends", "Processing", "Uncategorized"]
    );
}

#[tokio::test]
async fn undecodable_text_does_not_abort_the_split() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("source.db");
    let pool = open_raw(&path).await;
    sqlx::query("CREATE TABLE articles (url TEXT PRIMARY KEY, title TEXT, category TEXT)")
        .execute(&pool)
        .await
        .unwrap();
    sqlx::query(
        "INSERT INTO articles VALUES \
         ('https://example.org/bad', CAST(x'fffe41' AS TEXT), 'Processing'), \
         ('https://example.org/ok', 'Fine', 'Cultivation')",
    )
    .execute(&pool)
    .await
    .unwrap();
    pool.close().await;
    let out = dir.path().join("split");

    let report = CategorySplitter::new(&out).run(&path).await.unwrap();

    assert_eq!(report.rows_read, 2);
    assert_eq!(report.failed_rows, 0);
    assert_eq!(count_rows(&out.join("Cultivation.db"), "articles").await, 1);
    assert_eq!(count_rows(&out.join("Processing.db"), "articles").await, 1);

    let copy = open_raw(&out.join("Processing.db")).await;
    let (title,): (Vec<u8>,) = sqlx::query_as("SELECT CAST(title AS BLOB) FROM articles")
        .fetch_one(&copy)
        .await
        .unwrap();
    assert_eq!(title, vec![0xff, 0xfe, 0x41]);
    copy.close().await;
}

#[tokio::test]
async fn preserves_values_and_schema() {
    let dir = tempfile::tempdir().unwrap();
    let source = build_source(dir.path()).await;
    let out = dir.path().join("split");

    CategorySplitter::new(&out).run(&source).await.unwrap();

    let pool = open_raw(&out.join("Uncategorized.db")).await;
    let (category, score, payload): (Option<String>, f64, Vec<u8>) =
        sqlx::query_as("SELECT category, score, payload FROM articles WHERE url = ?")
            .bind("https://example.org/c")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(category, None);
    assert_eq!(score, 2.5);
    assert_eq!(payload, b"https://example.org/c");

    let ddl: String =
        sqlx::query_scalar("SELECT sql FROM sqlite_master WHERE type = 'table' AND name = 'articles'")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert!(ddl.contains("url TEXT PRIMARY KEY"));
    pool.close().await;
}

#[tokio::test]
async fn include_noncategory_copies_plain_tables() {
    let dir = tempfile::tempdir().unwrap();
    let source = build_source(dir.path()).await;
    let out = dir.path().join("split");

    let report = CategorySplitter::new(&out)
        .include_noncategory(true)
        .run(&source)
        .await
        .unwrap();

    assert!(report.tables_skipped.is_empty());
    assert_eq!(report.tables_processed.len(), 3);
    assert_eq!(count_rows(&out.join("Uncategorized.db"), "notes").await, 2);
}

#[tokio::test]
async fn rerun_replaces_keyed_rows() {
    let dir = tempfile::tempdir().unwrap();
    let source = build_source(dir.path()).await;
    let out = dir.path().join("split");
    let splitter = CategorySplitter::new(&out);

    splitter.run(&source).await.unwrap();
    splitter.run(&source).await.unwrap();

    assert_eq!(count_rows(&out.join("Processing.db"), "articles").await, 3);
}

#[tokio::test]
async fn small_batches_copy_every_row() {
    let dir = tempfile::tempdir().unwrap();
    let source = build_source(dir.path()).await;
    let out = dir.path().join("split");

    let report = CategorySplitter::new(&out)
        .with_batch_size(1)
        .run(&source)
        .await
        .unwrap();

    assert_eq!(report.rows_read, 6);
    assert_eq!(count_rows(&out.join("Processing.db"), "articles").await, 3);
}

#[tokio::test]
async fn missing_source_is_an_error() {
    let dir = tempfile::tempdir().unwrap();

    let err = CategorySplitter::new(dir.path())
        .run(&dir.path().join("nope.db"))
        .await
        .unwrap_err();

    assert!(matches!(err, CrawlError::ConfigError(_)));
}

#[tokio::test]
async fn splits_the_crawl_store() {
    let (db, dir) = setup_test_db().await;
    let repo = db.articles();
    repo.upsert(&article("https://example.org/a", "Processing", "mill"))
        .await
        .unwrap();
    repo.upsert(&article("https://example.org/b", "Cultivation", "seedlings"))
        .await
        .unwrap();
    db.close().await;

    let out = dir.path().join("split");
    let report = CategorySplitter::new(&out)
        .run(&dir.path().join("palmcrawl.db"))
        .await
        .unwrap();

    assert_eq!(report.tables_processed, vec!["articles"]);
    assert!(
        report
            .tables_skipped
            .iter()
            .any(|(table, _)| table == "_sqlx_migrations")
    );
    assert_eq!(count_rows(&out.join("Processing.db"), "articles").await, 1);
    assert_eq!(count_rows(&out.join("Cultivation.db"), "articles").await, 1);
}
