// src/store/sqlite.rs
// SQLite-backed store: WAL journal, bounded pool, schema ensured on open.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Pool, QueryBuilder, Row, Sqlite};
use std::str::FromStr;
use std::time::Duration;

use crate::error::StoreError;
use crate::model::{
    Alert, FetchStatus, FreshnessRecord, RunStatus, SyncCounts, SyncLogEntry, Urgency,
};
use crate::store::{AlertQuery, AlertStore, FreshnessStore, SyncLogStore};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS alerts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    identity_key TEXT NOT NULL,
    source TEXT NOT NULL,
    agency TEXT NOT NULL,
    category TEXT NOT NULL,
    region TEXT NOT NULL,
    title TEXT NOT NULL,
    summary TEXT NOT NULL,
    urgency TEXT NOT NULL,
    published_at TEXT NOT NULL,
    external_url TEXT,
    raw_payload TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_alerts_identity ON alerts (source, identity_key, created_at);
CREATE INDEX IF NOT EXISTS idx_alerts_filters ON alerts (category, urgency, published_at);

CREATE TABLE IF NOT EXISTS freshness (
    source TEXT PRIMARY KEY,
    last_successful_fetch TEXT,
    last_attempt TEXT NOT NULL,
    fetch_status TEXT NOT NULL,
    records_fetched INTEGER NOT NULL DEFAULT 0,
    error_message TEXT
);

CREATE TABLE IF NOT EXISTS sync_log (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    source_scope TEXT NOT NULL,
    status TEXT NOT NULL,
    fetched INTEGER NOT NULL DEFAULT 0,
    inserted INTEGER NOT NULL DEFAULT 0,
    updated INTEGER NOT NULL DEFAULT 0,
    skipped INTEGER NOT NULL DEFAULT 0,
    errors TEXT NOT NULL DEFAULT '[]',
    started_at TEXT NOT NULL,
    finished_at TEXT,
    metadata TEXT NOT NULL DEFAULT '{}'
);
"#;

#[derive(Clone)]
pub struct SqliteStore {
    pool: Pool<Sqlite>,
}

impl SqliteStore {
    pub async fn open(path: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(&format!("sqlite://{path}"))
            .map_err(|e| StoreError::Database(e.to_string()))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5))
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;
        let store = Self { pool };
        store.ensure_schema().await?;
        Ok(store)
    }

    /// Single-connection in-memory database, for tests.
    pub async fn in_memory() -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| StoreError::Database(e.to_string()))?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;
        let store = Self { pool };
        store.ensure_schema().await?;
        Ok(store)
    }

    async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA).execute(&self.pool).await?;
        Ok(())
    }
}

fn row_to_alert(row: &sqlx::sqlite::SqliteRow) -> Result<Alert, StoreError> {
    let urgency_raw: String = row.get("urgency");
    let urgency = Urgency::parse(&urgency_raw)
        .ok_or_else(|| StoreError::Database(format!("bad urgency value '{urgency_raw}'")))?;
    let raw_payload: String = row.get("raw_payload");
    Ok(Alert {
        identity_key: row.get("identity_key"),
        source: row.get("source"),
        agency: row.get("agency"),
        category: row.get("category"),
        region: row.get("region"),
        title: row.get("title"),
        summary: row.get("summary"),
        urgency,
        published_at: row.get("published_at"),
        external_url: row.get("external_url"),
        raw_payload: serde_json::from_str(&raw_payload)
            .map_err(|e| StoreError::Database(e.to_string()))?,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

#[async_trait]
impl AlertStore for SqliteStore {
    async fn find_by_identity_key(
        &self,
        source: &str,
        key: &str,
        window_start: DateTime<Utc>,
    ) -> Result<Option<Alert>, StoreError> {
        let row = sqlx::query(
            "SELECT * FROM alerts
             WHERE source = ?1 AND identity_key = ?2 AND created_at >= ?3
             ORDER BY created_at DESC LIMIT 1",
        )
        .bind(source)
        .bind(key)
        .bind(window_start)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(row_to_alert).transpose()
    }

    async fn insert_if_absent(
        &self,
        alert: &Alert,
        window_start: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        // One statement covers the lookup-then-write race: zero rows
        // affected means another writer landed the same key in-window.
        let raw = serde_json::to_string(&alert.raw_payload)
            .map_err(|e| StoreError::Database(e.to_string()))?;
        let res = sqlx::query(
            "INSERT INTO alerts (identity_key, source, agency, category, region, title,
                                 summary, urgency, published_at, external_url, raw_payload,
                                 created_at, updated_at)
             SELECT ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13
             WHERE NOT EXISTS (
                 SELECT 1 FROM alerts
                 WHERE source = ?2 AND identity_key = ?1 AND created_at >= ?14
             )",
        )
        .bind(&alert.identity_key)
        .bind(&alert.source)
        .bind(&alert.agency)
        .bind(&alert.category)
        .bind(&alert.region)
        .bind(&alert.title)
        .bind(&alert.summary)
        .bind(alert.urgency.as_str())
        .bind(alert.published_at)
        .bind(&alert.external_url)
        .bind(raw)
        .bind(alert.created_at)
        .bind(alert.updated_at)
        .bind(window_start)
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected() == 1)
    }

    async fn update_mutable(
        &self,
        source: &str,
        key: &str,
        summary: &str,
        raw_payload: &serde_json::Value,
        updated_at: DateTime<Utc>,
        window_start: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let raw = serde_json::to_string(raw_payload)
            .map_err(|e| StoreError::Database(e.to_string()))?;
        sqlx::query(
            "UPDATE alerts SET summary = ?1, raw_payload = ?2, updated_at = ?3
             WHERE source = ?4 AND identity_key = ?5 AND created_at >= ?6",
        )
        .bind(summary)
        .bind(raw)
        .bind(updated_at)
        .bind(source)
        .bind(key)
        .bind(window_start)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn query(&self, q: &AlertQuery) -> Result<Vec<Alert>, StoreError> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT * FROM alerts WHERE 1=1");
        if let Some(source) = &q.source {
            qb.push(" AND source = ").push_bind(source);
        }
        if let Some(category) = &q.category {
            qb.push(" AND category = ").push_bind(category);
        }
        if let Some(urgency) = q.urgency {
            qb.push(" AND urgency = ").push_bind(urgency.as_str());
        }
        qb.push(" ORDER BY published_at DESC LIMIT ")
            .push_bind(i64::from(q.limit))
            .push(" OFFSET ")
            .push_bind(i64::from(q.offset));

        let rows = qb.build().fetch_all(&self.pool).await?;
        rows.iter().map(row_to_alert).collect()
    }
}

#[async_trait]
impl FreshnessStore for SqliteStore {
    async fn upsert(&self, record: &FreshnessRecord) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO freshness (source, last_successful_fetch, last_attempt,
                                    fetch_status, records_fetched, error_message)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(source) DO UPDATE SET
                 last_successful_fetch =
                     COALESCE(excluded.last_successful_fetch, freshness.last_successful_fetch),
                 last_attempt = excluded.last_attempt,
                 fetch_status = excluded.fetch_status,
                 records_fetched = excluded.records_fetched,
                 error_message = excluded.error_message",
        )
        .bind(&record.source)
        .bind(record.last_successful_fetch)
        .bind(record.last_attempt)
        .bind(record.fetch_status.as_str())
        .bind(record.records_fetched)
        .bind(&record.error_message)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, source: &str) -> Result<Option<FreshnessRecord>, StoreError> {
        let row = sqlx::query("SELECT * FROM freshness WHERE source = ?1")
            .bind(source)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_freshness).transpose()
    }

    async fn all(&self) -> Result<Vec<FreshnessRecord>, StoreError> {
        let rows = sqlx::query("SELECT * FROM freshness ORDER BY source")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_freshness).collect()
    }
}

fn row_to_freshness(row: &sqlx::sqlite::SqliteRow) -> Result<FreshnessRecord, StoreError> {
    let status_raw: String = row.get("fetch_status");
    let fetch_status = FetchStatus::parse(&status_raw)
        .ok_or_else(|| StoreError::Database(format!("bad fetch_status '{status_raw}'")))?;
    Ok(FreshnessRecord {
        source: row.get("source"),
        last_successful_fetch: row.get("last_successful_fetch"),
        last_attempt: row.get("last_attempt"),
        fetch_status,
        records_fetched: row.get("records_fetched"),
        error_message: row.get("error_message"),
    })
}

#[async_trait]
impl SyncLogStore for SqliteStore {
    async fn start(
        &self,
        scope: &str,
        metadata: serde_json::Value,
        started_at: DateTime<Utc>,
    ) -> Result<i64, StoreError> {
        let meta = serde_json::to_string(&metadata)
            .map_err(|e| StoreError::Database(e.to_string()))?;
        let res = sqlx::query(
            "INSERT INTO sync_log (source_scope, status, started_at, metadata)
             VALUES (?1, 'running', ?2, ?3)",
        )
        .bind(scope)
        .bind(started_at)
        .bind(meta)
        .execute(&self.pool)
        .await?;
        Ok(res.last_insert_rowid())
    }

    async fn finish(
        &self,
        id: i64,
        status: RunStatus,
        counts: &SyncCounts,
        errors: &[String],
        finished_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let errors_json = serde_json::to_string(errors)
            .map_err(|e| StoreError::Database(e.to_string()))?;
        // `status = 'running'` guard makes the close idempotent.
        sqlx::query(
            "UPDATE sync_log
             SET status = ?1, fetched = ?2, inserted = ?3, updated = ?4, skipped = ?5,
                 errors = ?6, finished_at = ?7
             WHERE id = ?8 AND status = 'running'",
        )
        .bind(status.as_str())
        .bind(counts.fetched as i64)
        .bind(counts.inserted as i64)
        .bind(counts.updated as i64)
        .bind(counts.skipped as i64)
        .bind(errors_json)
        .bind(finished_at)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn recent(&self, limit: u32) -> Result<Vec<SyncLogEntry>, StoreError> {
        let rows = sqlx::query("SELECT * FROM sync_log ORDER BY id DESC LIMIT ?1")
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_log_entry).collect()
    }
}

fn row_to_log_entry(row: &sqlx::sqlite::SqliteRow) -> Result<SyncLogEntry, StoreError> {
    let status_raw: String = row.get("status");
    let status = RunStatus::parse(&status_raw)
        .ok_or_else(|| StoreError::Database(format!("bad run status '{status_raw}'")))?;
    let errors_raw: String = row.get("errors");
    let metadata_raw: String = row.get("metadata");
    Ok(SyncLogEntry {
        id: row.get("id"),
        source_scope: row.get("source_scope"),
        status,
        counts: SyncCounts {
            fetched: row.get::<i64, _>("fetched") as u64,
            inserted: row.get::<i64, _>("inserted") as u64,
            updated: row.get::<i64, _>("updated") as u64,
            skipped: row.get::<i64, _>("skipped") as u64,
        },
        errors: serde_json::from_str(&errors_raw)
            .map_err(|e| StoreError::Database(e.to_string()))?,
        started_at: row.get("started_at"),
        finished_at: row.get("finished_at"),
        metadata: serde_json::from_str(&metadata_raw)
            .map_err(|e| StoreError::Database(e.to_string()))?,
    })
}
