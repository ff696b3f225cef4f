// src/api.rs
// HTTP surface: the invocation contract for manual triggers plus the
// read-only views the dashboard and admin panels consume.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use tower_http::cors::CorsLayer;

use crate::model::{Alert, FreshnessRecord, RunReport, SyncLogEntry};
use crate::pipeline::{Pipeline, SyncAction};
use crate::store::{AlertQuery, AlertStore, FreshnessStore, SyncLogStore};

#[derive(Clone)]
pub struct AppState {
    pipeline: Arc<Pipeline>,
    alerts: Arc<dyn AlertStore>,
    freshness: Arc<dyn FreshnessStore>,
    sync_log: Arc<dyn SyncLogStore>,
}

impl AppState {
    pub fn new<S>(pipeline: Arc<Pipeline>, store: Arc<S>) -> Self
    where
        S: AlertStore + FreshnessStore + SyncLogStore + 'static,
    {
        Self {
            pipeline,
            alerts: store.clone(),
            freshness: store.clone(),
            sync_log: store,
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/sync", post(run_sync))
        .route("/alerts", get(list_alerts))
        .route("/admin/freshness", get(freshness_panel))
        .route("/admin/sync-log", get(sync_history))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

/// Manual trigger. The action enum is closed: unknown actions are a 422
/// from the extractor, not a silently ignored request.
async fn run_sync(State(state): State<AppState>, Json(action): Json<SyncAction>) -> Json<RunReport> {
    Json(state.pipeline.handle(action).await)
}

async fn list_alerts(
    State(state): State<AppState>,
    Query(q): Query<AlertQuery>,
) -> Result<Json<Vec<Alert>>, (StatusCode, String)> {
    state
        .alerts
        .query(&q)
        .await
        .map(Json)
        .map_err(internal)
}

async fn freshness_panel(
    State(state): State<AppState>,
) -> Result<Json<Vec<FreshnessRecord>>, (StatusCode, String)> {
    state.freshness.all().await.map(Json).map_err(internal)
}

#[derive(Deserialize)]
struct HistoryParams {
    #[serde(default = "default_history_limit")]
    limit: u32,
}

fn default_history_limit() -> u32 {
    20
}

async fn sync_history(
    State(state): State<AppState>,
    Query(p): Query<HistoryParams>,
) -> Result<Json<Vec<SyncLogEntry>>, (StatusCode, String)> {
    state
        .sync_log
        .recent(p.limit.min(200))
        .await
        .map(Json)
        .map_err(internal)
}

fn internal(e: crate::error::StoreError) -> (StatusCode, String) {
    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}
