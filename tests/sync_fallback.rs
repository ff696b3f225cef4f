// tests/sync_fallback.rs
// Fallback endpoint selection through the whole pipeline: failure-triggered
// after primary exhaustion, staleness-triggered fallback-first.

mod support;

use chrono::{Duration, Utc};
use regwatch::model::{FetchStatus, FreshnessRecord};
use regwatch::registry::SourceConfig;
use regwatch::store::FreshnessStore;
use support::{feed_source, rig};

const FSIS_FEED: &str = include_str!("fixtures/fsis_recalls.xml");
const PRIMARY: &str = "https://test.example/primary.xml";
const FALLBACK: &str = "https://test.example/fallback.xml";

fn source_with_fallback() -> SourceConfig {
    SourceConfig {
        fallback_endpoint: Some(FALLBACK.to_string()),
        ..feed_source("fsis", PRIMARY)
    }
}

async fn seed_freshness(store: &regwatch::MemoryStore, age: Duration) {
    let ts = Utc::now() - age;
    store
        .upsert(&FreshnessRecord {
            source: "fsis".into(),
            last_successful_fetch: Some(ts),
            last_attempt: ts,
            fetch_status: FetchStatus::Success,
            records_fetched: 1,
            error_message: None,
        })
        .await
        .unwrap();
}

#[tokio::test(start_paused = true)]
async fn primary_500_three_times_then_fallback_exactly_once() {
    let r = rig(vec![source_with_fallback()]);
    seed_freshness(&r.store, Duration::hours(1)).await;
    r.transport.respond(PRIMARY, 500, "");
    r.transport.respond(FALLBACK, 200, FSIS_FEED);

    let report = r.pipeline.run(None).await;
    assert!(report.success);
    assert_eq!(report.per_source_results[0].inserted, 1);

    assert_eq!(r.transport.hits_for(PRIMARY), 3);
    assert_eq!(r.transport.hits_for(FALLBACK), 1);
    // Primary attempted first when the source is fresh.
    assert_eq!(r.transport.hits()[0], PRIMARY);
}

#[tokio::test(start_paused = true)]
async fn stale_source_goes_fallback_first_and_skips_primary() {
    let r = rig(vec![source_with_fallback()]);
    seed_freshness(&r.store, Duration::hours(13)).await;
    r.transport.respond(FALLBACK, 200, FSIS_FEED);

    let report = r.pipeline.run(None).await;
    assert!(report.success);

    // Staleness >12h flips the leg order; the primary is never called when
    // the fallback leg succeeds.
    assert_eq!(r.transport.hits(), vec![FALLBACK.to_string()]);
}

#[tokio::test(start_paused = true)]
async fn stale_fallback_failure_still_reaches_primary() {
    let r = rig(vec![source_with_fallback()]);
    seed_freshness(&r.store, Duration::hours(20)).await;
    r.transport.respond(FALLBACK, 500, "");
    r.transport.respond(PRIMARY, 200, FSIS_FEED);

    let report = r.pipeline.run(None).await;
    assert!(report.success);
    assert_eq!(r.transport.hits_for(FALLBACK), 3);
    assert_eq!(r.transport.hits_for(PRIMARY), 1);
}

#[tokio::test(start_paused = true)]
async fn never_fetched_source_counts_as_stale() {
    let r = rig(vec![source_with_fallback()]);
    // No freshness record at all.
    r.transport.respond(FALLBACK, 200, FSIS_FEED);

    let report = r.pipeline.run(None).await;
    assert!(report.success);
    assert_eq!(r.transport.hits()[0], FALLBACK);
}
