// src/metrics.rs
// Prometheus wiring: recorder install, descriptions for everything the
// pipeline emits, and the /metrics route.

use axum::{routing::get, Router};
use metrics::{describe_counter, describe_gauge, describe_histogram, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Install the Prometheus recorder and describe the pipeline's metrics.
/// Call once at startup, before the first run.
pub fn install(sync_interval_secs: u64) -> PrometheusHandle {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("prometheus: install recorder");

    describe_counter!("sync_runs_total", "Pipeline invocations.");
    describe_counter!("sync_fetched_total", "Drafts parsed from source payloads.");
    describe_counter!("sync_inserted_total", "New alerts persisted.");
    describe_counter!("sync_updated_total", "Alerts updated on re-observation.");
    describe_counter!(
        "sync_skipped_total",
        "Items skipped (irrelevant, malformed, or duplicate)."
    );
    describe_counter!("sync_source_errors_total", "Whole-source failures.");
    describe_histogram!("sync_source_ms", "Per-source processing time in milliseconds.");
    describe_gauge!("sync_last_run_ts", "Unix ts of the last pipeline run.");
    describe_gauge!("sync_interval_secs", "Configured scheduler period.");

    gauge!("sync_interval_secs").set(sync_interval_secs as f64);

    handle
}

/// Router exposing `/metrics` in the Prometheus exposition format.
pub fn router(handle: PrometheusHandle) -> Router {
    Router::new().route(
        "/metrics",
        get(move || {
            let h = handle.clone();
            async move { h.render() }
        }),
    )
}
