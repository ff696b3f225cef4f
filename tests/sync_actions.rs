// tests/sync_actions.rs
// The invocation contract: action dispatch, scoping, and the write-free
// test_feeds probe.

mod support;

use regwatch::pipeline::SyncAction;
use regwatch::store::SyncLogStore;
use support::{feed_source, rig};

const FSIS_FEED: &str = include_str!("fixtures/fsis_recalls.xml");

#[tokio::test(start_paused = true)]
async fn scrape_source_only_touches_the_named_source() {
    let r = rig(vec![
        feed_source("alpha", "https://test.example/a.xml"),
        feed_source("bravo", "https://test.example/b.xml"),
    ]);
    r.transport.respond("https://test.example/a.xml", 200, FSIS_FEED);
    r.transport.respond("https://test.example/b.xml", 200, FSIS_FEED);

    let report = r
        .pipeline
        .handle(SyncAction::ScrapeSource {
            source: "alpha".into(),
        })
        .await;

    assert!(report.success);
    assert_eq!(report.per_source_results.len(), 1);
    assert_eq!(report.per_source_results[0].source, "alpha");
    assert_eq!(r.transport.hits_for("https://test.example/b.xml"), 0);
}

#[tokio::test(start_paused = true)]
async fn unknown_source_is_a_structured_failure() {
    let r = rig(vec![feed_source("alpha", "https://test.example/a.xml")]);

    let report = r
        .pipeline
        .handle(SyncAction::ScrapeSource {
            source: "nonexistent".into(),
        })
        .await;

    assert!(!report.success);
    assert_eq!(report.per_source_results.len(), 1);
    assert!(report.per_source_results[0]
        .error
        .as_deref()
        .unwrap()
        .contains("unknown source"));
    assert_eq!(r.transport.hits().len(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_feeds_probes_without_writing_anything() {
    let r = rig(vec![
        feed_source("alpha", "https://test.example/a.xml"),
        feed_source("bravo", "https://test.example/b.xml"),
    ]);
    r.transport.respond("https://test.example/a.xml", 200, FSIS_FEED);
    r.transport.respond("https://test.example/b.xml", 503, "");

    let report = r.pipeline.handle(SyncAction::TestFeeds).await;

    assert!(report.success);
    assert_eq!(report.total_processed, 0);
    assert_eq!(report.per_source_results.len(), 2);
    assert!(report.per_source_results[1].error.is_some());

    // Probes only: one request per source, no retries.
    assert_eq!(r.transport.hits().len(), 2);
    // And nothing persisted anywhere.
    assert_eq!(r.store.alert_count(), 0);
    assert!(r.store.recent(10).await.unwrap().is_empty());
}
