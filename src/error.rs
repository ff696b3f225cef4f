// src/error.rs
// Error taxonomy for the ingestion pipeline. Failures are contained at the
// smallest unit possible: item > source > run.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("request to {url} failed: {reason}")]
    Network { url: String, reason: String },

    #[error("request to {url} timed out")]
    Timeout { url: String },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("all endpoints exhausted for source '{source_name}': {last_error}")]
    Exhausted {
        source_name: String,
        last_error: String,
    },

    #[error("source '{source_name}' has no endpoints configured")]
    NoEndpoints { source_name: String },
}

impl FetchError {
    /// Only 429 and 5xx responses are worth retrying against the same
    /// endpoint; other 4xx statuses fail immediately.
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Network { .. } | FetchError::Timeout { .. } => true,
            FetchError::Status { status, .. } => *status == 429 || *status >= 500,
            FetchError::Exhausted { .. } | FetchError::NoEndpoints { .. } => false,
        }
    }
}

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("unparsable {shape} payload from '{source_name}': {reason}")]
    Malformed {
        source_name: String,
        shape: &'static str,
        reason: String,
    },

    #[error("invalid selector '{selector}' for source '{source_name}'")]
    BadSelector {
        source_name: String,
        selector: String,
    },
}

#[derive(Error, Debug)]
pub enum StoreError {
    /// A uniqueness race on insert. Reclassified as a duplicate/skip by the
    /// deduplicator, never surfaced as a run error.
    #[error("duplicate identity key within dedup window")]
    Duplicate,

    #[error("database error: {0}")]
    Database(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::Duplicate,
            _ => StoreError::Database(e.to_string()),
        }
    }
}

/// A whole-source failure within one run. The run continues with the next
/// source; the error lands in the sync log.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("source '{0}' is already being synced by a concurrent run")]
    AlreadyRunning(String),

    #[error("unknown source '{0}'")]
    UnknownSource(String),
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("every source in scope failed")]
    AllSourcesFailed,

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_errors_render_their_source_context() {
        let err = FetchError::Exhausted {
            source_name: "fsis".into(),
            last_error: "HTTP 500".into(),
        };
        assert_eq!(
            err.to_string(),
            "all endpoints exhausted for source 'fsis': HTTP 500"
        );
        // The whole taxonomy is usable as a plain error trait object.
        let _: &dyn std::error::Error = &err;
    }

    #[test]
    fn parse_errors_render_their_source_context() {
        let err = ParseError::Malformed {
            source_name: "fda".into(),
            shape: "api",
            reason: "bad json".into(),
        };
        assert_eq!(err.to_string(), "unparsable api payload from 'fda': bad json");
        let _: &dyn std::error::Error = &err;
    }
}
