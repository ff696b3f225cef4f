// tests/sync_pipeline.rs
// End-to-end runs over all three payload shapes, against scripted
// transports and the in-memory store.

mod support;

use regwatch::model::{FetchStatus, Urgency};
use regwatch::store::{AlertQuery, AlertStore};
use support::{api_source, feed_source, html_source, rig};

const FSIS_FEED: &str = include_str!("fixtures/fsis_recalls.xml");
const FDA_JSON: &str = include_str!("fixtures/fda_enforcement.json");
const OSHA_HTML: &str = include_str!("fixtures/osha_news.html");

#[tokio::test(start_paused = true)]
async fn feed_source_listeria_scenario() {
    let r = rig(vec![feed_source("fsis", "https://test.example/fsis.xml")]);
    r.transport.respond("https://test.example/fsis.xml", 200, FSIS_FEED);

    let report = r.pipeline.run(Some("fsis")).await;
    assert!(report.success);
    assert_eq!(report.per_source_results.len(), 1);

    let out = &report.per_source_results[0];
    assert_eq!(out.status, FetchStatus::Success);
    // Two parseable items; the linkless one is malformed.
    assert_eq!(out.fetched, 2);
    assert_eq!(out.inserted, 1);
    // Skipped: one malformed + one irrelevant newsletter.
    assert_eq!(out.skipped, 2);
    assert_eq!(out.updated, 0);

    let alerts = r.store.query(&AlertQuery::default()).await.unwrap();
    assert_eq!(alerts.len(), 1);
    let a = &alerts[0];
    assert_eq!(a.title, "Listeria contamination found in deli meats");
    assert_eq!(a.urgency, Urgency::High);
    assert_eq!(a.source, "fsis");
    assert_eq!(
        a.external_url.as_deref(),
        Some("https://www.fsis.usda.gov/recalls-alerts/deli-meats-2024-01")
    );
    assert_eq!(a.published_at.to_rfc3339(), "2024-01-02T15:04:05+00:00");
    assert_eq!(a.raw_payload["guid"], "fsis-2024-001");
}

#[tokio::test(start_paused = true)]
async fn api_source_maps_aliased_fields() {
    let r = rig(vec![api_source("fda", "https://test.example/fda.json")]);
    r.transport.respond("https://test.example/fda.json", 200, FDA_JSON);

    let report = r.pipeline.run(None).await;
    assert!(report.success);
    assert_eq!(report.total_processed, 2);

    let alerts = r.store.query(&AlertQuery::default()).await.unwrap();
    assert_eq!(alerts.len(), 2);

    let spinach = alerts
        .iter()
        .find(|a| a.title.contains("spinach"))
        .expect("spinach recall present");
    assert_eq!(spinach.urgency, Urgency::High);
    assert_eq!(spinach.summary, "Potential E. coli contamination found during routine sampling");
    assert_eq!(spinach.published_at.date_naive().to_string(), "2024-01-05");
    assert_eq!(spinach.raw_payload["recall_number"], "F-0001-2024");
}

#[tokio::test(start_paused = true)]
async fn html_source_extracts_items_and_resolves_links() {
    let r = rig(vec![html_source("osha", "https://www.osha.gov/news")]);
    r.transport.respond("https://www.osha.gov/news", 200, OSHA_HTML);

    let report = r.pipeline.run(None).await;
    assert!(report.success);

    let out = &report.per_source_results[0];
    // Two real items parsed; the nav "Home" block has a sub-10-char title.
    assert_eq!(out.fetched, 2);
    assert_eq!(out.inserted, 1);
    // Skipped: the nav block plus the irrelevant comment-period item.
    assert_eq!(out.skipped, 2);

    let alerts = r.store.query(&AlertQuery::default()).await.unwrap();
    assert_eq!(alerts.len(), 1);
    let a = &alerts[0];
    assert!(a.title.contains("trench collapse fatality"));
    assert_eq!(a.urgency, Urgency::High);
    assert_eq!(
        a.external_url.as_deref(),
        Some("https://www.osha.gov/news/newsreleases/2024-01-trench")
    );
}

#[tokio::test(start_paused = true)]
async fn query_filters_apply() {
    let r = rig(vec![
        feed_source("fsis", "https://test.example/fsis.xml"),
        api_source("fda", "https://test.example/fda.json"),
    ]);
    r.transport.respond("https://test.example/fsis.xml", 200, FSIS_FEED);
    r.transport.respond("https://test.example/fda.json", 200, FDA_JSON);

    assert!(r.pipeline.run(None).await.success);

    let only_fda = r
        .store
        .query(&AlertQuery {
            source: Some("fda".into()),
            ..AlertQuery::default()
        })
        .await
        .unwrap();
    assert_eq!(only_fda.len(), 2);
    assert!(only_fda.iter().all(|a| a.source == "fda"));

    let high = r
        .store
        .query(&AlertQuery {
            urgency: Some(Urgency::High),
            ..AlertQuery::default()
        })
        .await
        .unwrap();
    assert!(!high.is_empty());
    assert!(high.iter().all(|a| a.urgency == Urgency::High));
}

#[tokio::test(start_paused = true)]
async fn unparsable_payload_fails_the_source_not_the_run() {
    let r = rig(vec![feed_source("fsis", "https://test.example/fsis.xml")]);
    r.transport.respond("https://test.example/fsis.xml", 200, "{definitely not xml");

    let report = r.pipeline.run(None).await;
    assert!(!report.success);
    let out = &report.per_source_results[0];
    assert_eq!(out.status, FetchStatus::Error);
    assert!(out.error.as_deref().unwrap().contains("unparsable"));
}
