// src/lib.rs
// Public library surface for integration tests (and potential reuse).

pub mod api;
pub mod error;
pub mod fetch;
pub mod metrics;
pub mod model;
pub mod parse;
pub mod pipeline;
pub mod registry;
pub mod relevance;
pub mod scheduler;
pub mod store;
pub mod urgency;

// ---- Re-exports for stable public API ----
pub use crate::api::{create_router, AppState};
pub use crate::model::{Alert, FreshnessRecord, RunReport, SyncLogEntry, Urgency};
pub use crate::pipeline::{Pipeline, PipelineConfig, SyncAction};
pub use crate::registry::{SourceConfig, SourceRegistry};
pub use crate::store::{MemoryStore, SqliteStore};
