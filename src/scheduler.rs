// src/scheduler.rs
// Cron-like trigger: a background task driving `scrape_all` on a fixed
// interval. Manual triggers go through the HTTP surface instead.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::pipeline::{Pipeline, SyncAction};

#[derive(Clone, Copy, Debug)]
pub struct SchedulerCfg {
    pub interval_secs: u64,
}

pub fn spawn(pipeline: Arc<Pipeline>, cfg: SchedulerCfg) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(cfg.interval_secs));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let report = pipeline.handle(SyncAction::ScrapeAll).await;
            tracing::info!(
                target: "scheduler",
                success = report.success,
                total_processed = report.total_processed,
                sources = report.per_source_results.len(),
                "scheduled sync tick"
            );
        }
    })
}
