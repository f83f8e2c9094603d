use palmcrawl_core::CategoryMirror;
use palmcrawl_db::SqliteCategoryMirror;

use crate::integration::common::{article, count_rows, open_raw};

#[tokio::test]
async fn mirrors_into_one_store_per_category() {
    let dir = tempfile::tempdir().unwrap();
    let mirror = SqliteCategoryMirror::new(dir.path().join("categories"));

    let slug = mirror
        .mirror(&article("https://example.org/a", "Market Trends", "price body"))
        .await
        .unwrap();
    mirror
        .mirror(&article("https://example.org/b", "Market Trends", "other body"))
        .await
        .unwrap();
    mirror
        .mirror(&article("https://example.org/c", "Processing", "mill body"))
        .await
        .unwrap();

    assert_eq!(slug.as_deref(), Some("Market_Trends"));
    mirror.close().await;
    let stores = std::fs::read_dir(dir.path().join("categories"))
        .unwrap()
        .filter(|e| e.as_ref().unwrap().path().extension().is_some_and(|x| x == "db"))
        .count();
    assert_eq!(stores, 2);

    let market = dir.path().join("categories").join("Market_Trends.db");
    assert_eq!(count_rows(&market, "articles").await, 2);
    assert_eq!(
        count_rows(&dir.path().join("categories").join("Processing.db"), "articles").await,
        1
    );
}

#[tokio::test]
async fn mirror_replaces_by_url() {
    let dir = tempfile::tempdir().unwrap();
    let mirror = SqliteCategoryMirror::new(dir.path());

    mirror
        .mirror(&article("https://example.org/a", "Processing", "first"))
        .await
        .unwrap();
    mirror
        .mirror(&article("https://example.org/a", "Processing", "second"))
        .await
        .unwrap();
    mirror.close().await;

    let pool = open_raw(&dir.path().join("Processing.db")).await;
    let content: String = sqlx::query_scalar("SELECT content FROM articles WHERE url = ?")
        .bind("https://example.org/a")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(content, "second");
}

#[tokio::test]
async fn blank_category_is_uncategorized() {
    let dir = tempfile::tempdir().unwrap();
    let mirror = SqliteCategoryMirror::new(dir.path());

    let slug = mirror
        .mirror(&article("https://example.org/a", "  ", "body"))
        .await
        .unwrap();
    mirror.close().await;

    assert_eq!(slug.as_deref(), Some("Uncategorized"));
    assert!(dir.path().join("Uncategorized.db").exists());
}

#[tokio::test]
async fn beside_writes_next_to_the_primary_store() {
    let dir = tempfile::tempdir().unwrap();
    let mirror = SqliteCategoryMirror::beside(&dir.path().join("palmcrawl.db"));

    mirror
        .mirror(&article("https://example.org/a", "Cultivation", "body"))
        .await
        .unwrap();
    mirror.close().await;

    assert!(dir.path().join("Cultivation.db").exists());
}
