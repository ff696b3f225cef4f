// src/pipeline.rs
// Run orchestration: for each source in scope, fetch → parse → filter →
// classify → dedup → persist, with freshness written per source and the
// sync log wrapping the whole run. Failures are contained item > source >
// run; one bad feed never blocks the others.

use chrono::Utc;
use metrics::{counter, gauge, histogram};
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::error::{PipelineError, SourceError, StoreError};
use crate::fetch::{is_stale, Fetcher};
use crate::model::{
    identity_key, Alert, FetchStatus, FreshnessRecord, RunReport, RunStatus, SourceOutcome,
    SyncCounts,
};
use crate::parse::{parse_date, parser_for, resolve_link, truncate_chars, SUMMARY_MAX_CHARS};
use crate::registry::{SourceConfig, SourceRegistry};
use crate::relevance::is_relevant;
use crate::store::{AlertStore, FreshnessStore, SyncLogStore};
use crate::urgency;

/// Politeness delay between sources; public endpoints are shared
/// infrastructure. Do not parallelize sources without re-deriving per-host
/// rate limits.
pub const DEFAULT_INTER_SOURCE_DELAY_MS: u64 = 1500;

/// Invocation contract for schedulers and manual triggers. Closed set:
/// unknown actions fail deserialization instead of being silently ignored.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum SyncAction {
    ScrapeAll,
    ScrapeSource { source: String },
    TestFeeds,
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub inter_source_delay: Duration,
    /// Soft run deadline, checked between sources only; a source in flight
    /// is never interrupted mid-item.
    pub max_run_duration: Option<Duration>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            inter_source_delay: Duration::from_millis(DEFAULT_INTER_SOURCE_DELAY_MS),
            max_run_duration: None,
        }
    }
}

pub struct Pipeline {
    registry: SourceRegistry,
    fetcher: Fetcher,
    alerts: Arc<dyn AlertStore>,
    freshness: Arc<dyn FreshnessStore>,
    sync_log: Arc<dyn SyncLogStore>,
    cfg: PipelineConfig,
    in_flight: Mutex<HashSet<String>>,
}

impl Pipeline {
    pub fn new<S>(registry: SourceRegistry, fetcher: Fetcher, store: Arc<S>, cfg: PipelineConfig) -> Self
    where
        S: AlertStore + FreshnessStore + SyncLogStore + 'static,
    {
        Self {
            registry,
            fetcher,
            alerts: store.clone(),
            freshness: store.clone(),
            sync_log: store,
            cfg,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    /// Exhaustive action dispatch; every variant has exactly one handler.
    pub async fn handle(&self, action: SyncAction) -> RunReport {
        match action {
            SyncAction::ScrapeAll => self.run(None).await,
            SyncAction::ScrapeSource { source } => self.run(Some(&source)).await,
            SyncAction::TestFeeds => self.probe_feeds().await,
        }
    }

    /// One pipeline invocation over all sources or a single named one.
    /// Always returns a structured report, even on total failure.
    pub async fn run(&self, scope: Option<&str>) -> RunReport {
        let started = Instant::now();
        let started_at = Utc::now();
        let scope_label = scope.unwrap_or("all").to_string();

        let (sources, mut outcomes): (Vec<SourceConfig>, Vec<SourceOutcome>) = match scope {
            None => (self.registry.iter().cloned().collect(), Vec::new()),
            Some(name) => match self.registry.get(name) {
                Some(src) => (vec![src.clone()], Vec::new()),
                None => (
                    Vec::new(),
                    vec![SourceOutcome::failed(name, format!("unknown source '{name}'"))],
                ),
            },
        };

        let metadata = serde_json::json!({
            "sources_in_scope": sources.iter().map(|s| s.name.clone()).collect::<Vec<_>>(),
        });
        let log_id = match self
            .sync_log
            .start(&scope_label, metadata, started_at)
            .await
        {
            Ok(id) => Some(id),
            Err(e) => {
                tracing::error!(error = %e, "failed to open sync log entry");
                None
            }
        };

        counter!("sync_runs_total").increment(1);
        tracing::info!(scope = %scope_label, sources = sources.len(), "sync run started");

        for (i, src) in sources.iter().enumerate() {
            if let Some(max) = self.cfg.max_run_duration {
                if started.elapsed() > max {
                    tracing::warn!(source = %src.name, "run deadline exceeded, aborting between sources");
                    outcomes.push(SourceOutcome::failed(&src.name, "run deadline exceeded".into()));
                    continue;
                }
            }
            if i > 0 && !self.cfg.inter_source_delay.is_zero() {
                tokio::time::sleep(self.cfg.inter_source_delay).await;
            }

            let t0 = Instant::now();
            let outcome = self.sync_source(src).await;
            histogram!("sync_source_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
            if outcome.status == FetchStatus::Error {
                counter!("sync_source_errors_total").increment(1);
            }
            outcomes.push(outcome);
        }

        let mut counts = SyncCounts::default();
        let mut errors = Vec::new();
        for o in &outcomes {
            counts.absorb(&SyncCounts {
                fetched: o.fetched,
                inserted: o.inserted,
                updated: o.updated,
                skipped: o.skipped,
            });
            if let Some(e) = &o.error {
                errors.push(format!("{}: {}", o.source, e));
            }
        }

        // The run succeeds if at least one source succeeded; `error` is
        // reserved for every-source-failed.
        let any_success = outcomes.iter().any(|o| o.status == FetchStatus::Success);
        let status = if any_success { RunStatus::Success } else { RunStatus::Error };
        if status == RunStatus::Error {
            tracing::error!(scope = %scope_label, error = %PipelineError::AllSourcesFailed, "sync run failed");
        }

        if let Some(id) = log_id {
            if let Err(e) = self
                .sync_log
                .finish(id, status, &counts, &errors, Utc::now())
                .await
            {
                tracing::error!(error = %e, "failed to close sync log entry");
            }
        }

        counter!("sync_fetched_total").increment(counts.fetched);
        counter!("sync_inserted_total").increment(counts.inserted);
        counter!("sync_updated_total").increment(counts.updated);
        counter!("sync_skipped_total").increment(counts.skipped);
        gauge!("sync_last_run_ts").set(started_at.timestamp().max(0) as f64);

        tracing::info!(
            scope = %scope_label,
            status = status.as_str(),
            fetched = counts.fetched,
            inserted = counts.inserted,
            updated = counts.updated,
            skipped = counts.skipped,
            errors = errors.len(),
            "sync run finished"
        );

        RunReport {
            success: any_success,
            total_processed: counts.fetched,
            per_source_results: outcomes,
            timestamp: started_at,
        }
    }

    /// Connectivity probe only: one lightweight request per source in scope,
    /// no retries, no records written.
    pub async fn probe_feeds(&self) -> RunReport {
        let timestamp = Utc::now();
        let mut outcomes = Vec::new();
        for src in self.registry.iter() {
            let outcome = match self.fetcher.probe(src).await {
                Ok(status) => {
                    tracing::debug!(source = %src.name, status, "probe ok");
                    SourceOutcome {
                        source: src.name.clone(),
                        fetched: 0,
                        inserted: 0,
                        updated: 0,
                        skipped: 0,
                        status: FetchStatus::Success,
                        error: None,
                    }
                }
                Err(e) => SourceOutcome::failed(&src.name, e.to_string()),
            };
            outcomes.push(outcome);
        }
        RunReport {
            success: outcomes.iter().any(|o| o.status == FetchStatus::Success),
            total_processed: 0,
            per_source_results: outcomes,
            timestamp,
        }
    }

    /// One source, failures contained. Freshness is written whatever the
    /// outcome, so staleness stays computable.
    async fn sync_source(&self, src: &SourceConfig) -> SourceOutcome {
        let Some(_guard) = FlightGuard::acquire(&self.in_flight, &src.name) else {
            // A concurrent run holds this source; rejecting (not queueing)
            // keeps overlapping cron and manual triggers safe. The holder
            // will write freshness.
            return SourceOutcome::failed(
                &src.name,
                SourceError::AlreadyRunning(src.name.clone()).to_string(),
            );
        };

        let attempt_at = Utc::now();
        let prior = match self.freshness.get(&src.name).await {
            Ok(rec) => rec,
            Err(e) => {
                tracing::warn!(source = %src.name, error = %e, "freshness lookup failed");
                None
            }
        };
        let stale = is_stale(prior.and_then(|p| p.last_successful_fetch), attempt_at);

        match self.process_source(src, stale).await {
            Ok((counts, item_errors)) => {
                self.write_freshness(src, FetchStatus::Success, counts.fetched as i64, None)
                    .await;
                SourceOutcome {
                    source: src.name.clone(),
                    fetched: counts.fetched,
                    inserted: counts.inserted,
                    updated: counts.updated,
                    skipped: counts.skipped,
                    status: FetchStatus::Success,
                    error: (!item_errors.is_empty()).then(|| item_errors.join("; ")),
                }
            }
            Err(e) => {
                tracing::warn!(source = %src.name, error = %e, "source failed");
                self.write_freshness(src, FetchStatus::Error, 0, Some(e.to_string()))
                    .await;
                SourceOutcome::failed(&src.name, e.to_string())
            }
        }
    }

    async fn process_source(
        &self,
        src: &SourceConfig,
        stale: bool,
    ) -> Result<(SyncCounts, Vec<String>), SourceError> {
        let payload = self.fetcher.fetch(src, stale).await?;
        let batch = parser_for(src.kind).parse(&payload.body, src)?;

        let now = Utc::now();
        let window_start = now - src.dedup_window();
        let base = src.base_url();

        let mut counts = SyncCounts {
            fetched: batch.drafts.len() as u64,
            skipped: batch.malformed as u64,
            ..SyncCounts::default()
        };
        let mut item_errors = Vec::new();

        for draft in batch.drafts {
            if !is_relevant(&draft, &src.keywords) {
                counts.skipped += 1;
                continue;
            }

            let key = identity_key(&src.name, draft.external_id.as_deref(), &draft.title);
            let summary = truncate_chars(&draft.description, SUMMARY_MAX_CHARS);

            let existing = match self
                .alerts
                .find_by_identity_key(&src.name, &key, window_start)
                .await
            {
                Ok(found) => found,
                Err(e) => {
                    item_errors.push(e.to_string());
                    continue;
                }
            };

            if existing.is_some() {
                match self
                    .alerts
                    .update_mutable(&src.name, &key, &summary, &draft.raw_payload, now, window_start)
                    .await
                {
                    Ok(()) => counts.updated += 1,
                    Err(StoreError::Duplicate) => counts.skipped += 1,
                    Err(e) => item_errors.push(e.to_string()),
                }
                continue;
            }

            let alert = Alert {
                identity_key: key,
                source: src.name.clone(),
                agency: src.agency.clone(),
                category: src.category.clone(),
                region: src.region.clone(),
                title: draft.title.clone(),
                summary,
                urgency: urgency::classify(&draft.matchable_text(), src.default_urgency),
                published_at: parse_date(draft.raw_date.as_deref(), now),
                external_url: resolve_link(draft.link.as_deref(), base.as_ref()),
                raw_payload: draft.raw_payload,
                created_at: now,
                updated_at: now,
            };

            match self.alerts.insert_if_absent(&alert, window_start).await {
                Ok(true) => counts.inserted += 1,
                // Lost the lookup-then-write race: a duplicate, not an error.
                Ok(false) | Err(StoreError::Duplicate) => counts.skipped += 1,
                Err(e) => item_errors.push(e.to_string()),
            }
        }

        Ok((counts, item_errors))
    }

    async fn write_freshness(
        &self,
        src: &SourceConfig,
        status: FetchStatus,
        records_fetched: i64,
        error_message: Option<String>,
    ) {
        let now = Utc::now();
        let record = FreshnessRecord {
            source: src.name.clone(),
            last_successful_fetch: (status == FetchStatus::Success).then_some(now),
            last_attempt: now,
            fetch_status: status,
            records_fetched,
            error_message,
        };
        if let Err(e) = self.freshness.upsert(&record).await {
            tracing::error!(source = %src.name, error = %e, "freshness upsert failed");
        }
    }
}

/// In-process single-flight guard per source name; released on drop.
struct FlightGuard<'a> {
    set: &'a Mutex<HashSet<String>>,
    name: String,
}

impl<'a> FlightGuard<'a> {
    fn acquire(set: &'a Mutex<HashSet<String>>, name: &str) -> Option<Self> {
        let mut held = set.lock().expect("in-flight set poisoned");
        if !held.insert(name.to_string()) {
            return None;
        }
        Some(Self {
            set,
            name: name.to_string(),
        })
    }
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.set
            .lock()
            .expect("in-flight set poisoned")
            .remove(&self.name);
    }
}
