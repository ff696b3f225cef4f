// src/store/memory.rs
// In-memory store used by tests and local experiments. Same window
// semantics as the SQLite store, minus durability.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::StoreError;
use crate::model::{Alert, FreshnessRecord, RunStatus, SyncCounts, SyncLogEntry};
use crate::store::{AlertQuery, AlertStore, FreshnessStore, SyncLogStore};

#[derive(Default)]
pub struct MemoryStore {
    alerts: Mutex<Vec<Alert>>,
    freshness: Mutex<HashMap<String, FreshnessRecord>>,
    log: Mutex<Vec<SyncLogEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Test helper: pre-seed an alert row as a prior run would have left it.
    pub fn seed_alert(&self, alert: Alert) {
        self.alerts.lock().expect("alerts mutex poisoned").push(alert);
    }

    pub fn alert_count(&self) -> usize {
        self.alerts.lock().expect("alerts mutex poisoned").len()
    }
}

#[async_trait]
impl AlertStore for MemoryStore {
    async fn find_by_identity_key(
        &self,
        source: &str,
        key: &str,
        window_start: DateTime<Utc>,
    ) -> Result<Option<Alert>, StoreError> {
        let alerts = self.alerts.lock().expect("alerts mutex poisoned");
        Ok(alerts
            .iter()
            .filter(|a| a.source == source && a.identity_key == key && a.created_at >= window_start)
            .max_by_key(|a| a.created_at)
            .cloned())
    }

    async fn insert_if_absent(
        &self,
        alert: &Alert,
        window_start: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut alerts = self.alerts.lock().expect("alerts mutex poisoned");
        let exists = alerts.iter().any(|a| {
            a.source == alert.source
                && a.identity_key == alert.identity_key
                && a.created_at >= window_start
        });
        if exists {
            return Ok(false);
        }
        alerts.push(alert.clone());
        Ok(true)
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
        let mut alerts = self.alerts.lock().expect("alerts mutex poisoned");
        if let Some(a) = alerts
            .iter_mut()
            .filter(|a| {
                a.source == source && a.identity_key == key && a.created_at >= window_start
            })
            .max_by_key(|a| a.created_at)
        {
            a.summary = summary.to_string();
            a.raw_payload = raw_payload.clone();
            a.updated_at = updated_at;
        }
        Ok(())
    }

    async fn query(&self, q: &AlertQuery) -> Result<Vec<Alert>, StoreError> {
        let alerts = self.alerts.lock().expect("alerts mutex poisoned");
        let mut out: Vec<Alert> = alerts
            .iter()
            .filter(|a| q.source.as_ref().is_none_or(|s| &a.source == s))
            .filter(|a| q.category.as_ref().is_none_or(|c| &a.category == c))
            .filter(|a| q.urgency.is_none_or(|u| a.urgency == u))
            .cloned()
            .collect();
        out.sort_by(|a, b| b.published_at.cmp(&a.published_at));
        Ok(out
            .into_iter()
            .skip(q.offset as usize)
            .take(q.limit as usize)
            .collect())
    }
}

#[async_trait]
impl FreshnessStore for MemoryStore {
    async fn upsert(&self, record: &FreshnessRecord) -> Result<(), StoreError> {
        let mut map = self.freshness.lock().expect("freshness mutex poisoned");
        let mut next = record.clone();
        if next.last_successful_fetch.is_none() {
            if let Some(prev) = map.get(&record.source) {
                next.last_successful_fetch = prev.last_successful_fetch;
            }
        }
        map.insert(record.source.clone(), next);
        Ok(())
    }

    async fn get(&self, source: &str) -> Result<Option<FreshnessRecord>, StoreError> {
        let map = self.freshness.lock().expect("freshness mutex poisoned");
        Ok(map.get(source).cloned())
    }

    async fn all(&self) -> Result<Vec<FreshnessRecord>, StoreError> {
        let map = self.freshness.lock().expect("freshness mutex poisoned");
        let mut out: Vec<FreshnessRecord> = map.values().cloned().collect();
        out.sort_by(|a, b| a.source.cmp(&b.source));
        Ok(out)
    }
}

#[async_trait]
impl SyncLogStore for MemoryStore {
    async fn start(
        &self,
        scope: &str,
        metadata: serde_json::Value,
        started_at: DateTime<Utc>,
    ) -> Result<i64, StoreError> {
        let mut log = self.log.lock().expect("log mutex poisoned");
        let id = log.len() as i64 + 1;
        log.push(SyncLogEntry {
            id,
            source_scope: scope.to_string(),
            status: RunStatus::Running,
            counts: SyncCounts::default(),
            errors: Vec::new(),
            started_at,
            finished_at: None,
            metadata,
        });
        Ok(id)
    }

    async fn finish(
        &self,
        id: i64,
        status: RunStatus,
        counts: &SyncCounts,
        errors: &[String],
        finished_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut log = self.log.lock().expect("log mutex poisoned");
        if let Some(entry) = log
            .iter_mut()
            .find(|e| e.id == id && e.status == RunStatus::Running)
        {
            entry.status = status;
            entry.counts = *counts;
            entry.errors = errors.to_vec();
            entry.finished_at = Some(finished_at);
        }
        Ok(())
    }

    async fn recent(&self, limit: u32) -> Result<Vec<SyncLogEntry>, StoreError> {
        let log = self.log.lock().expect("log mutex poisoned");
        Ok(log.iter().rev().take(limit as usize).cloned().collect())
    }
}
