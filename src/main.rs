//! regwatch — Binary entrypoint.
//! Boots the ingestion pipeline, the interval scheduler, and the Axum HTTP
//! surface (manual triggers, dashboard queries, admin panels, /metrics).

use std::sync::Arc;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use regwatch::fetch::Fetcher;
use regwatch::metrics;
use regwatch::pipeline::{Pipeline, PipelineConfig};
use regwatch::registry::SourceRegistry;
use regwatch::scheduler::{self, SchedulerCfg};
use regwatch::store::SqliteStore;
use regwatch::{create_router, AppState};

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("regwatch=info,warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    let registry = SourceRegistry::load_default()?;
    tracing::info!(sources = registry.len(), "source registry loaded");

    let db_path = std::env::var("REGWATCH_DB_PATH").unwrap_or_else(|_| "regwatch.db".to_string());
    let store = Arc::new(SqliteStore::open(&db_path).await?);

    let interval_secs = env_u64("REGWATCH_SYNC_INTERVAL_SECS", 3600);
    let metrics_handle = metrics::install(interval_secs);

    let pipeline = Arc::new(Pipeline::new(
        registry,
        Fetcher::over_http(),
        store.clone(),
        PipelineConfig::default(),
    ));

    scheduler::spawn(pipeline.clone(), SchedulerCfg { interval_secs });

    let state = AppState::new(pipeline, store);
    let router = create_router(state).merge(metrics::router(metrics_handle));

    let addr = std::env::var("REGWATCH_BIND").unwrap_or_else(|_| "0.0.0.0:8000".to_string());
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "regwatch listening");
    axum::serve(listener, router).await?;
    Ok(())
}
