// src/store/mod.rs
// Persistence seams consumed by the pipeline and the admin/dashboard
// surfaces. One SQLite implementation for production, one in-memory
// implementation for hermetic tests.

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::StoreError;
use crate::model::{Alert, FreshnessRecord, RunStatus, SyncCounts, SyncLogEntry, Urgency};

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Filters for the dashboard-facing alert query.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct AlertQuery {
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub urgency: Option<Urgency>,
    #[serde(default = "AlertQuery::default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
}

impl AlertQuery {
    fn default_limit() -> u32 {
        50
    }
}

impl Default for AlertQuery {
    fn default() -> Self {
        Self {
            source: None,
            category: None,
            urgency: None,
            limit: Self::default_limit(),
            offset: 0,
        }
    }
}

#[async_trait]
pub trait AlertStore: Send + Sync {
    /// Latest record with this identity key created inside the dedup window.
    async fn find_by_identity_key(
        &self,
        source: &str,
        key: &str,
        window_start: DateTime<Utc>,
    ) -> Result<Option<Alert>, StoreError>;

    /// Atomic conditional insert: writes the alert only if no record with
    /// the same identity key exists inside the window. Returns false when a
    /// concurrent writer won the race; callers count that as skipped.
    async fn insert_if_absent(
        &self,
        alert: &Alert,
        window_start: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    /// Re-observation path: only `summary`, `raw_payload`, and `updated_at`
    /// are mutable once a record is written. Scoped to rows created inside
    /// the window; an expired row with the same identity key is archived
    /// history and stays untouched.
    async fn update_mutable(
        &self,
        source: &str,
        key: &str,
        summary: &str,
        raw_payload: &serde_json::Value,
        updated_at: DateTime<Utc>,
        window_start: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    async fn query(&self, q: &AlertQuery) -> Result<Vec<Alert>, StoreError>;
}

#[async_trait]
pub trait FreshnessStore: Send + Sync {
    /// Upsert keyed by source name. A record carrying
    /// `last_successful_fetch = None` preserves the previously stored
    /// success timestamp (failed attempts never erase it).
    async fn upsert(&self, record: &FreshnessRecord) -> Result<(), StoreError>;

    async fn get(&self, source: &str) -> Result<Option<FreshnessRecord>, StoreError>;

    async fn all(&self) -> Result<Vec<FreshnessRecord>, StoreError>;
}

#[async_trait]
pub trait SyncLogStore: Send + Sync {
    /// Open a run entry with status `running`; returns its id.
    async fn start(
        &self,
        scope: &str,
        metadata: serde_json::Value,
        started_at: DateTime<Utc>,
    ) -> Result<i64, StoreError>;

    /// Close a run entry exactly once. Closing an already-closed entry is a
    /// no-op at the storage level.
    async fn finish(
        &self,
        id: i64,
        status: RunStatus,
        counts: &SyncCounts,
        errors: &[String],
        finished_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    async fn recent(&self, limit: u32) -> Result<Vec<SyncLogEntry>, StoreError>;
}
