use palmcrawl_core::{ArticleStore, CrawlError};

use crate::integration::common::{article, setup_test_db};

#[tokio::test]
async fn upsert_and_enumerate() {
    let (db, _dir) = setup_test_db().await;
    let repo = db.articles();

    repo.upsert(&article("https://example.org/a", "Cultivation", "first body"))
        .await
        .unwrap();
    repo.upsert(&article("https://example.org/b", "Processing", "second body"))
        .await
        .unwrap();

    assert_eq!(repo.count().await.unwrap(), 2);
    let all = repo.enumerate(None).await.unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].url, "https://example.org/a");
    assert_eq!(all[0].category, "Cultivation");
    assert_eq!(all[0].content, "first body");

    let limited = repo.enumerate(Some(1)).await.unwrap();
    assert_eq!(limited.len(), 1);
}

#[tokio::test]
async fn upsert_replaces_by_url() {
    let (db, _dir) = setup_test_db().await;
    let repo = db.articles();

    repo.upsert(&article("https://example.org/a", "Cultivation", "old body"))
        .await
        .unwrap();
    repo.upsert(&article("https://example.org/a", "Processing", "new body"))
        .await
        .unwrap();

    assert_eq!(repo.count().await.unwrap(), 1);
    let stored = repo.enumerate(None).await.unwrap();
    assert_eq!(stored[0].category, "Processing");
    assert_eq!(stored[0].content, "new body");
}

#[tokio::test]
async fn same_content_under_other_url_is_a_constraint_violation() {
    let (db, _dir) = setup_test_db().await;
    let repo = db.articles();

    repo.upsert(&article("https://example.org/a", "Cultivation", "shared body"))
        .await
        .unwrap();
    let err = repo
        .upsert(&article("https://example.org/b", "Cultivation", "shared body"))
        .await
        .unwrap_err();

    match err {
        CrawlError::ConstraintViolation {
            url, existing_url, ..
        } => {
            assert_eq!(url, "https://example.org/b");
            assert_eq!(existing_url, "https://example.org/a");
        }
        other => panic!("expected ConstraintViolation, got {other:?}"),
    }
    assert_eq!(repo.count().await.unwrap(), 1);
}

#[tokio::test]
async fn exists_by_hash() {
    let (db, _dir) = setup_test_db().await;
    let repo = db.articles();
    let a = article("https://example.org/a", "Cultivation", "hashed body");

    assert!(!repo.exists_by_hash(&a.content_hash).await.unwrap());
    repo.upsert(&a).await.unwrap();
    assert!(repo.exists_by_hash(&a.content_hash).await.unwrap());
}

#[tokio::test]
async fn hash_held_elsewhere_ignores_the_own_row() {
    let (db, _dir) = setup_test_db().await;
    let repo = db.articles();
    let a = article("https://example.org/a", "Cultivation", "hashed body");
    repo.upsert(&a).await.unwrap();

    assert!(!repo.hash_held_elsewhere(&a.content_hash, &a.url).await.unwrap());
    assert!(
        repo.hash_held_elsewhere(&a.content_hash, "https://example.org/b")
            .await
            .unwrap()
    );
    assert!(!repo.hash_held_elsewhere("0000", "https://example.org/b").await.unwrap());
}

#[tokio::test]
async fn category_queries() {
    let (db, _dir) = setup_test_db().await;
    let repo = db.articles();

    for (url, category, body) in [
        ("https://example.org/1", "Processing", "one"),
        ("https://example.org/2", "Processing", "two"),
        ("https://example.org/3", "Market Trends", "three"),
    ] {
        repo.upsert(&article(url, category, body)).await.unwrap();
    }

    let processing = repo.by_category("Processing").await.unwrap();
    assert_eq!(processing.len(), 2);

    let counts = repo.category_counts().await.unwrap();
    assert_eq!(
        counts,
        vec![
            ("Processing".to_string(), 2),
            ("Market Trends".to_string(), 1)
        ]
    );
}
