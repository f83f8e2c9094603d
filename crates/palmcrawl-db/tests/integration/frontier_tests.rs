use palmcrawl_core::Frontier;

use crate::integration::common::{allow_list, setup_test_db};

fn urls(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn pops_in_fifo_order() {
    let (db, _dir) = setup_test_db().await;
    let frontier = db.frontier(allow_list());

    let added = frontier
        .seed(&urls(&[
            "https://example.org/1",
            "https://example.org/2",
            "https://example.org/1",
        ]))
        .await
        .unwrap();
    assert_eq!(added, 2);

    let first = frontier.pop().await.unwrap().unwrap();
    let second = frontier.pop().await.unwrap().unwrap();
    assert_eq!(first.url, "https://example.org/1");
    assert_eq!(first.depth, 0);
    assert_eq!(second.url, "https://example.org/2");
    assert!(frontier.pop().await.unwrap().is_none());
}

#[tokio::test]
async fn seeds_skip_the_allow_list() {
    let (db, _dir) = setup_test_db().await;
    let frontier = db.frontier(allow_list());

    frontier
        .seed(&urls(&["https://elsewhere.net/start", "not a url"]))
        .await
        .unwrap();

    assert_eq!(frontier.pending_count().await.unwrap(), 1);
    let entry = frontier.pop().await.unwrap().unwrap();
    assert_eq!(entry.url, "https://elsewhere.net/start");
}

#[tokio::test]
async fn admit_links_filters_and_bounds_depth() {
    let (db, _dir) = setup_test_db().await;
    let frontier = db.frontier(allow_list());

    let added = frontier
        .admit_links(
            &urls(&[
                "https://example.org/child",
                "https://example.org/child#section",
                "https://sub.example.org/page",
                "https://news.example.com/story",
                "https://unrelated.net/page",
            ]),
            0,
            2,
        )
        .await
        .unwrap();
    assert_eq!(added, 3);

    let entry = frontier.pop().await.unwrap().unwrap();
    assert_eq!(entry.url, "https://example.org/child");
    assert_eq!(entry.depth, 1);

    let too_deep = frontier
        .admit_links(&urls(&["https://example.org/deep"]), 2, 2)
        .await
        .unwrap();
    assert_eq!(too_deep, 0);
}

#[tokio::test]
async fn visited_urls_are_never_requeued() {
    let (db, _dir) = setup_test_db().await;
    let frontier = db.frontier(allow_list());

    frontier
        .seed(&urls(&["https://example.org/a"]))
        .await
        .unwrap();
    let entry = frontier.pop().await.unwrap().unwrap();
    frontier.mark_visited(&entry.url).await.unwrap();

    assert!(frontier.is_visited("https://example.org/a").await.unwrap());
    assert_eq!(frontier.pending_count().await.unwrap(), 0);
    assert_eq!(frontier.visited_count().await.unwrap(), 1);

    let readded = frontier
        .admit_links(&urls(&["https://example.org/a"]), 0, 3)
        .await
        .unwrap();
    assert_eq!(readded, 0);
    assert_eq!(frontier.seed(&urls(&["https://example.org/a"])).await.unwrap(), 0);
}

#[tokio::test]
async fn leases_survive_until_released() {
    let (db, _dir) = setup_test_db().await;
    let frontier = db.frontier(allow_list());

    frontier
        .seed(&urls(&["https://example.org/a", "https://example.org/b"]))
        .await
        .unwrap();
    let claimed = frontier.pop().await.unwrap().unwrap();
    assert_eq!(claimed.url, "https://example.org/a");

    // Claimed but unfinished urls stay pending
    assert_eq!(frontier.pending_count().await.unwrap(), 2);

    let released = frontier.release_leases().await.unwrap();
    assert_eq!(released, 1);
    let again = frontier.pop().await.unwrap().unwrap();
    assert_eq!(again.url, "https://example.org/a");
}

#[tokio::test]
async fn frontier_is_resumable_across_connections() {
    let (db, dir) = setup_test_db().await;
    let frontier = db.frontier(allow_list());
    frontier
        .seed(&urls(&["https://example.org/a", "https://example.org/b"]))
        .await
        .unwrap();
    let first = frontier.pop().await.unwrap().unwrap();
    frontier.mark_visited(&first.url).await.unwrap();
    db.close().await;

    let config = palmcrawl_db::DatabaseConfig::new(dir.path().join("palmcrawl.db"));
    let reopened = palmcrawl_db::Database::connect(&config).await.unwrap();
    reopened.migrate().await.unwrap();
    let frontier = reopened.frontier(allow_list());

    let pending = frontier.pending().await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].url, "https://example.org/b");
    assert!(frontier.is_visited("https://example.org/a").await.unwrap());
}

#[tokio::test]
async fn concurrent_pops_claim_distinct_urls() {
    let (db, _dir) = setup_test_db().await;
    let frontier = db.frontier(allow_list());
    let seeds: Vec<String> = (0..20)
        .map(|i| format!("https://example.org/{i}"))
        .collect();
    frontier.seed(&seeds).await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..4 {
        let frontier = frontier.clone();
        handles.push(tokio::spawn(async move {
            let mut claimed = Vec::new();
            while let Some(entry) = frontier.pop().await.unwrap() {
                claimed.push(entry.url);
            }
            claimed
        }));
    }

    let mut all = Vec::new();
    for handle in handles {
        all.extend(handle.await.unwrap());
    }
    all.sort();
    all.dedup();
    assert_eq!(all.len(), 20);
}
