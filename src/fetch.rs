// src/fetch.rs
// Fetcher: bounded-timeout retrieval with retry, backoff, and fallback
// endpoint selection. Public endpoints are slow and flaky; the policy here
// is deliberately conservative.

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::sync::Arc;
use std::time::Duration;

use crate::error::FetchError;
use crate::registry::SourceConfig;

pub const FETCH_TIMEOUT_SECS: u64 = 15;
pub const MAX_ATTEMPTS: u32 = 3;
pub const STALENESS_THRESHOLD_HOURS: i64 = 12;

const USER_AGENT: &str = "regwatch-ingest/0.1 (regulatory alert aggregator)";

#[derive(Debug, Clone)]
pub struct HttpBody {
    pub status: u16,
    pub body: String,
}

/// Seam between the retry policy and the wire. Tests script responses here
/// instead of standing up a live server.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &str) -> Result<HttpBody, FetchError>;
}

pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(FETCH_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_default();
        Self { client }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &str) -> Result<HttpBody, FetchError> {
        let resp = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout { url: url.to_string() }
            } else {
                FetchError::Network {
                    url: url.to_string(),
                    reason: e.to_string(),
                }
            }
        })?;
        let status = resp.status().as_u16();
        let body = resp.text().await.map_err(|e| FetchError::Network {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        Ok(HttpBody { status, body })
    }
}

/// Raw payload plus which endpoint produced it.
#[derive(Debug, Clone)]
pub struct RawPayload {
    pub body: String,
    pub endpoint: String,
    pub via_fallback: bool,
}

/// A source is stale when it has never fetched successfully, or the last
/// success is older than the threshold.
pub fn is_stale(last_successful_fetch: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    match last_successful_fetch {
        None => true,
        Some(ts) => now - ts > ChronoDuration::hours(STALENESS_THRESHOLD_HOURS),
    }
}

/// Endpoint legs in attempt order. Chosen fallback precedence: when the
/// source is stale and a fallback exists, the fallback leg runs first and
/// the primary becomes the second leg; otherwise primary first, fallback
/// after primary exhaustion.
pub fn plan_legs(src: &SourceConfig, stale: bool) -> Vec<(String, bool)> {
    match &src.fallback_endpoint {
        Some(fb) if stale => vec![(fb.clone(), true), (src.endpoint.clone(), false)],
        Some(fb) => vec![(src.endpoint.clone(), false), (fb.clone(), true)],
        None => vec![(src.endpoint.clone(), false)],
    }
}

pub struct Fetcher {
    transport: Arc<dyn Transport>,
}

impl Fetcher {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    pub fn over_http() -> Self {
        Self::new(Arc::new(HttpTransport::new()))
    }

    /// Fetch a source's payload, walking the planned endpoint legs. Each leg
    /// gets the full retry policy. Both legs exhausted propagates a
    /// `FetchError`; the caller moves on to the next source.
    pub async fn fetch(&self, src: &SourceConfig, stale: bool) -> Result<RawPayload, FetchError> {
        let legs = plan_legs(src, stale);
        if legs.is_empty() {
            return Err(FetchError::NoEndpoints {
                source_name: src.name.clone(),
            });
        }

        let mut last_error = String::new();
        for (url, via_fallback) in legs {
            tracing::debug!(source = %src.name, %url, via_fallback, "fetch leg");
            match self.try_endpoint(&url).await {
                Ok(body) => {
                    return Ok(RawPayload {
                        body,
                        endpoint: url,
                        via_fallback,
                    })
                }
                Err(e) => {
                    tracing::warn!(source = %src.name, %url, error = %e, "fetch leg failed");
                    last_error = e.to_string();
                }
            }
        }

        Err(FetchError::Exhausted {
            source_name: src.name.clone(),
            last_error,
        })
    }

    /// Lightweight connectivity probe for `test_feeds`: one request to the
    /// primary endpoint, no retries, no writes.
    pub async fn probe(&self, src: &SourceConfig) -> Result<u16, FetchError> {
        let resp = self.transport.get(&src.endpoint).await?;
        if (200..300).contains(&resp.status) {
            Ok(resp.status)
        } else {
            Err(FetchError::Status {
                url: src.endpoint.clone(),
                status: resp.status,
            })
        }
    }

    /// Retry the same endpoint up to MAX_ATTEMPTS with `2^attempt`s backoff,
    /// but only for retryable failures (timeouts, 429, 5xx).
    async fn try_endpoint(&self, url: &str) -> Result<String, FetchError> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let err = match self.transport.get(url).await {
                Ok(resp) if (200..300).contains(&resp.status) => return Ok(resp.body),
                Ok(resp) => FetchError::Status {
                    url: url.to_string(),
                    status: resp.status,
                },
                Err(e) => e,
            };

            if !err.is_retryable() || attempt >= MAX_ATTEMPTS {
                return Err(err);
            }
            let backoff = Duration::from_secs(2u64.saturating_pow(attempt));
            tracing::debug!(%url, attempt, backoff_secs = backoff.as_secs(), "retrying after backoff");
            tokio::time::sleep(backoff).await;
        }
    }
}
