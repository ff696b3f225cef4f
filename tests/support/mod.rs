// tests/support/mod.rs
// Shared test plumbing: a scripted transport (no live HTTP), source config
// builders, and a pipeline wired to the in-memory store.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use regwatch::error::FetchError;
use regwatch::fetch::{Fetcher, HttpBody, Transport};
use regwatch::model::Urgency;
use regwatch::pipeline::{Pipeline, PipelineConfig};
use regwatch::registry::{ApiFields, HtmlSelectors, PayloadKind, SourceConfig, SourceRegistry};
use regwatch::store::MemoryStore;

/// Scripted responses per URL, recording every request. The last queued
/// response for a URL is sticky so retries keep seeing it.
#[derive(Default)]
pub struct ScriptedTransport {
    responses: Mutex<HashMap<String, VecDeque<HttpBody>>>,
    hits: Mutex<Vec<String>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, url: &str, status: u16, body: &str) {
        self.responses
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_default()
            .push_back(HttpBody {
                status,
                body: body.to_string(),
            });
    }

    /// Replace whatever is scripted for this URL.
    pub fn set_response(&self, url: &str, status: u16, body: &str) {
        let mut map = self.responses.lock().unwrap();
        let q = map.entry(url.to_string()).or_default();
        q.clear();
        q.push_back(HttpBody {
            status,
            body: body.to_string(),
        });
    }

    pub fn hits(&self) -> Vec<String> {
        self.hits.lock().unwrap().clone()
    }

    pub fn hits_for(&self, url: &str) -> usize {
        self.hits.lock().unwrap().iter().filter(|u| *u == url).count()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn get(&self, url: &str) -> Result<HttpBody, FetchError> {
        self.hits.lock().unwrap().push(url.to_string());
        let mut map = self.responses.lock().unwrap();
        match map.get_mut(url) {
            Some(q) if q.len() > 1 => Ok(q.pop_front().unwrap()),
            Some(q) if q.len() == 1 => Ok(q.front().unwrap().clone()),
            _ => Err(FetchError::Network {
                url: url.to_string(),
                reason: "no scripted response".into(),
            }),
        }
    }
}

pub fn feed_source(name: &str, endpoint: &str) -> SourceConfig {
    SourceConfig {
        name: name.to_string(),
        agency: "TEST".to_string(),
        category: "food".to_string(),
        region: "US".to_string(),
        kind: PayloadKind::Feed,
        endpoint: endpoint.to_string(),
        fallback_endpoint: None,
        keywords: vec!["recall".to_string(), "contamination".to_string()],
        default_urgency: Urgency::Low,
        dedup_window_days: 14,
        api: None,
        html: None,
    }
}

pub fn api_source(name: &str, endpoint: &str) -> SourceConfig {
    SourceConfig {
        kind: PayloadKind::Api,
        api: Some(ApiFields {
            items_path: Some("results".to_string()),
            ..ApiFields::default()
        }),
        ..feed_source(name, endpoint)
    }
}

pub fn html_source(name: &str, endpoint: &str) -> SourceConfig {
    SourceConfig {
        kind: PayloadKind::Html,
        html: Some(HtmlSelectors {
            item: "div.news-item".to_string(),
            title: "h3".to_string(),
            link: "a".to_string(),
            date: Some("span.date".to_string()),
            summary: Some("p.teaser".to_string()),
        }),
        ..feed_source(name, endpoint)
    }
}

/// An alert row as a prior run would have persisted it.
pub fn seeded_alert(source: &str, key: &str, created_at: chrono::DateTime<chrono::Utc>) -> regwatch::Alert {
    regwatch::Alert {
        identity_key: key.to_string(),
        source: source.to_string(),
        agency: "TEST".to_string(),
        category: "food".to_string(),
        region: "US".to_string(),
        title: "Listeria contamination found in deli meats".to_string(),
        summary: "original summary".to_string(),
        urgency: Urgency::High,
        published_at: created_at,
        external_url: None,
        raw_payload: serde_json::json!({"seed": true}),
        created_at,
        updated_at: created_at,
    }
}

pub struct TestRig {
    pub pipeline: Pipeline,
    pub store: Arc<MemoryStore>,
    pub transport: Arc<ScriptedTransport>,
}

/// Pipeline over the in-memory store with the politeness delay disabled.
pub fn rig(sources: Vec<SourceConfig>) -> TestRig {
    let transport = Arc::new(ScriptedTransport::new());
    let store = Arc::new(MemoryStore::new());
    let pipeline = Pipeline::new(
        SourceRegistry::new(sources),
        Fetcher::new(transport.clone()),
        store.clone(),
        PipelineConfig {
            inter_source_delay: std::time::Duration::ZERO,
            max_run_duration: None,
        },
    );
    TestRig {
        pipeline,
        store,
        transport,
    }
}
