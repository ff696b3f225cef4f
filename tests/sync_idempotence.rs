// tests/sync_idempotence.rs
// Re-running a source against identical upstream data must not insert
// anything new: prior rows are updated in place.

mod support;

use regwatch::model::RunStatus;
use regwatch::store::{AlertStore, SyncLogStore};
use support::{feed_source, rig};

const FSIS_FEED: &str = include_str!("fixtures/fsis_recalls.xml");

#[tokio::test(start_paused = true)]
async fn second_run_yields_zero_inserts() {
    let r = rig(vec![feed_source("fsis", "https://test.example/fsis.xml")]);
    r.transport.respond("https://test.example/fsis.xml", 200, FSIS_FEED);

    let first = r.pipeline.run(None).await;
    assert_eq!(first.per_source_results[0].inserted, 1);
    assert_eq!(r.store.alert_count(), 1);

    let second = r.pipeline.run(None).await;
    let out = &second.per_source_results[0];
    assert_eq!(out.inserted, 0);
    assert_eq!(out.updated, 1);
    assert_eq!(r.store.alert_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn each_run_closes_its_own_sync_log_entry() {
    let r = rig(vec![feed_source("fsis", "https://test.example/fsis.xml")]);
    r.transport.respond("https://test.example/fsis.xml", 200, FSIS_FEED);

    r.pipeline.run(None).await;
    r.pipeline.run(Some("fsis")).await;

    let entries = r.store.recent(10).await.unwrap();
    assert_eq!(entries.len(), 2);
    for e in &entries {
        assert_eq!(e.status, RunStatus::Success);
        assert!(e.finished_at.is_some());
    }
    // Newest first.
    assert_eq!(entries[0].source_scope, "fsis");
    assert_eq!(entries[1].source_scope, "all");
    assert_eq!(entries[1].counts.inserted, 1);
    assert_eq!(entries[0].counts.updated, 1);
}

#[tokio::test(start_paused = true)]
async fn update_only_touches_mutable_fields() {
    let r = rig(vec![feed_source("fsis", "https://test.example/fsis.xml")]);
    r.transport.respond("https://test.example/fsis.xml", 200, FSIS_FEED);
    r.pipeline.run(None).await;

    let before = r
        .store
        .query(&regwatch::store::AlertQuery::default())
        .await
        .unwrap()
        .remove(0);

    // Same item, revised description: summary changes, identity does not.
    let revised = FSIS_FEED.replace(
        "Ready-to-eat deli meats recalled after sampling found Listeria monocytogenes.",
        "Recall expanded to additional contamination lots.",
    );
    r.transport.set_response("https://test.example/fsis.xml", 200, &revised);
    let report = r.pipeline.run(None).await;
    assert_eq!(report.per_source_results[0].updated, 1);

    let after = r
        .store
        .query(&regwatch::store::AlertQuery::default())
        .await
        .unwrap()
        .remove(0);
    assert_eq!(after.identity_key, before.identity_key);
    assert_eq!(after.published_at, before.published_at);
    assert_eq!(after.created_at, before.created_at);
    assert_eq!(after.summary, "Recall expanded to additional contamination lots.");
    assert!(after.updated_at >= before.updated_at);
}
