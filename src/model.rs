// src/model.rs
// Canonical record shapes shared by the pipeline, the stores, and the API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Severity tier for a regulatory notice. Never null on a persisted alert:
/// the classifier falls back to the source's configured default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Low,
    Medium,
    High,
    Critical,
}

impl Urgency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Urgency::Low => "low",
            Urgency::Medium => "medium",
            Urgency::High => "high",
            Urgency::Critical => "critical",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Some(Urgency::Low),
            "medium" => Some(Urgency::Medium),
            "high" => Some(Urgency::High),
            "critical" => Some(Urgency::Critical),
            _ => None,
        }
    }
}

impl std::fmt::Display for Urgency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Intermediate item shape every parser funnels into, before relevance,
/// classification, and persistence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertDraft {
    pub title: String,
    pub description: String,
    pub link: Option<String>,
    pub raw_date: Option<String>,
    pub external_id: Option<String>,
    /// Original parsed fragment, retained for audit/debugging.
    pub raw_payload: serde_json::Value,
}

impl AlertDraft {
    /// Combined text the relevance filter and urgency classifier look at.
    pub fn matchable_text(&self) -> String {
        format!("{} {}", self.title, self.description)
    }
}

/// Canonical ingested record. `summary`, `raw_payload`, and `updated_at` are
/// the only fields mutated after the first write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub identity_key: String,
    pub source: String,
    pub agency: String,
    pub category: String,
    pub region: String,
    pub title: String,
    pub summary: String,
    pub urgency: Urgency,
    pub published_at: DateTime<Utc>,
    pub external_url: Option<String>,
    pub raw_payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Dedup identity: sha-256 over the source name plus the source-provided
/// external id, or the title when the source has no stable id.
pub fn identity_key(source: &str, external_id: Option<&str>, title: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source.as_bytes());
    hasher.update([0x1f]);
    hasher.update(external_id.unwrap_or(title).as_bytes());
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchStatus {
    Success,
    Error,
}

impl FetchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FetchStatus::Success => "success",
            FetchStatus::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "success" => Some(FetchStatus::Success),
            "error" => Some(FetchStatus::Error),
            _ => None,
        }
    }
}

/// One row per source, upserted at the end of every attempt so staleness can
/// always be computed as `now - last_successful_fetch`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FreshnessRecord {
    pub source: String,
    pub last_successful_fetch: Option<DateTime<Utc>>,
    pub last_attempt: DateTime<Utc>,
    pub fetch_status: FetchStatus,
    pub records_fetched: i64,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Success,
    Error,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "running",
            RunStatus::Success => "success",
            RunStatus::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "running" => Some(RunStatus::Running),
            "success" => Some(RunStatus::Success),
            "error" => Some(RunStatus::Error),
            _ => None,
        }
    }
}

/// Per-run counters rolled up across sources.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncCounts {
    pub fetched: u64,
    pub inserted: u64,
    pub updated: u64,
    pub skipped: u64,
}

impl SyncCounts {
    pub fn absorb(&mut self, other: &SyncCounts) {
        self.fetched += other.fetched;
        self.inserted += other.inserted;
        self.updated += other.updated;
        self.skipped += other.skipped;
    }
}

/// Audit record of one pipeline invocation. Opened with status `running`,
/// closed exactly once as `success` or `error`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncLogEntry {
    pub id: i64,
    pub source_scope: String,
    pub status: RunStatus,
    pub counts: SyncCounts,
    pub errors: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub metadata: serde_json::Value,
}

/// Outcome of one source within a run, surfaced in the invocation response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceOutcome {
    pub source: String,
    pub fetched: u64,
    pub inserted: u64,
    pub updated: u64,
    pub skipped: u64,
    pub status: FetchStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SourceOutcome {
    pub fn failed(source: &str, error: String) -> Self {
        Self {
            source: source.to_string(),
            fetched: 0,
            inserted: 0,
            updated: 0,
            skipped: 0,
            status: FetchStatus::Error,
            error: Some(error),
        }
    }
}

/// Structured result of one invocation; returned even on total failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub success: bool,
    pub total_processed: u64,
    pub per_source_results: Vec<SourceOutcome>,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_key_prefers_external_id() {
        let by_id = identity_key("fda", Some("R-123"), "Some recall");
        let by_id_other_title = identity_key("fda", Some("R-123"), "Renamed recall");
        assert_eq!(by_id, by_id_other_title);

        let by_title = identity_key("fda", None, "Some recall");
        assert_ne!(by_id, by_title);
    }

    #[test]
    fn identity_key_is_scoped_to_source() {
        assert_ne!(
            identity_key("fda", None, "Same title"),
            identity_key("epa", None, "Same title")
        );
    }

    #[test]
    fn urgency_round_trips_through_text() {
        for u in [Urgency::Low, Urgency::Medium, Urgency::High, Urgency::Critical] {
            assert_eq!(Urgency::parse(u.as_str()), Some(u));
        }
        assert_eq!(Urgency::parse("bogus"), None);
    }
}
