// src/registry.rs
// Declarative source registry. Sources are value objects loaded at process
// start; adding one is a config change, not a pipeline change.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::model::Urgency;

pub const ENV_SOURCES_PATH: &str = "REGWATCH_SOURCES_PATH";
pub const DEFAULT_SOURCES_PATH: &str = "config/sources.toml";

/// Declared payload shape. Parser selection keys off this; adding a fourth
/// shape means a new parser impl, not edits to existing ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadKind {
    Api,
    Feed,
    Html,
}

impl PayloadKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PayloadKind::Api => "api",
            PayloadKind::Feed => "feed",
            PayloadKind::Html => "html",
        }
    }
}

/// Field-name aliases for structured-API payloads. Each list is tried in
/// order; agencies rarely agree on naming.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiFields {
    /// Key holding the record array; empty means the payload root is the array.
    #[serde(default)]
    pub items_path: Option<String>,
    #[serde(default = "ApiFields::default_title")]
    pub title: Vec<String>,
    #[serde(default = "ApiFields::default_description")]
    pub description: Vec<String>,
    #[serde(default = "ApiFields::default_id")]
    pub id: Vec<String>,
    #[serde(default = "ApiFields::default_date")]
    pub date: Vec<String>,
    #[serde(default = "ApiFields::default_link")]
    pub link: Vec<String>,
}

impl ApiFields {
    fn default_title() -> Vec<String> {
        vec!["title".into(), "product_description".into(), "headline".into()]
    }
    fn default_description() -> Vec<String> {
        vec![
            "description".into(),
            "reason_for_recall".into(),
            "summary".into(),
            "body".into(),
        ]
    }
    fn default_id() -> Vec<String> {
        vec!["id".into(), "recall_number".into(), "event_id".into()]
    }
    fn default_date() -> Vec<String> {
        vec![
            "report_date".into(),
            "published_date".into(),
            "date".into(),
            "recall_initiation_date".into(),
        ]
    }
    fn default_link() -> Vec<String> {
        vec!["url".into(), "link".into(), "more_code_info".into()]
    }
}

impl Default for ApiFields {
    fn default() -> Self {
        Self {
            items_path: None,
            title: Self::default_title(),
            description: Self::default_description(),
            id: Self::default_id(),
            date: Self::default_date(),
            link: Self::default_link(),
        }
    }
}

/// CSS selectors for HTML-shaped sources.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HtmlSelectors {
    pub item: String,
    pub title: String,
    pub link: String,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub name: String,
    pub agency: String,
    #[serde(default)]
    pub category: String,
    #[serde(default = "default_region")]
    pub region: String,
    pub kind: PayloadKind,
    pub endpoint: String,
    #[serde(default)]
    pub fallback_endpoint: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default = "default_urgency")]
    pub default_urgency: Urgency,
    #[serde(default = "default_window_days")]
    pub dedup_window_days: u32,
    #[serde(default)]
    pub api: Option<ApiFields>,
    #[serde(default)]
    pub html: Option<HtmlSelectors>,
}

fn default_region() -> String {
    "US".to_string()
}

fn default_urgency() -> Urgency {
    Urgency::Low
}

fn default_window_days() -> u32 {
    14
}

impl SourceConfig {
    /// Rolling dedup window, clamped to the supported 7-30 day range.
    pub fn dedup_window(&self) -> chrono::Duration {
        chrono::Duration::days(i64::from(self.dedup_window_days.clamp(7, 30)))
    }

    /// Base URL relative item links resolve against.
    pub fn base_url(&self) -> Option<url::Url> {
        url::Url::parse(&self.endpoint).ok()
    }
}

#[derive(Debug, Clone, Default)]
pub struct SourceRegistry {
    sources: Vec<SourceConfig>,
}

#[derive(Deserialize)]
struct SourcesFile {
    sources: Vec<SourceConfig>,
}

impl SourceRegistry {
    pub fn new(sources: Vec<SourceConfig>) -> Self {
        Self { sources }
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let file: SourcesFile = toml::from_str(s).context("parsing sources toml")?;
        if file.sources.is_empty() {
            return Err(anyhow!("sources file declares no sources"));
        }
        Ok(Self::new(file.sources))
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading sources from {}", path.display()))?;
        Self::from_toml_str(&content)
    }

    /// Load the registry using env var + fallback:
    /// 1) $REGWATCH_SOURCES_PATH
    /// 2) config/sources.toml
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = std::env::var(ENV_SOURCES_PATH) {
            let pb = PathBuf::from(p);
            if pb.exists() {
                return Self::load_from(&pb);
            }
            return Err(anyhow!("REGWATCH_SOURCES_PATH points to non-existent path"));
        }
        let default = PathBuf::from(DEFAULT_SOURCES_PATH);
        if default.exists() {
            return Self::load_from(&default);
        }
        Err(anyhow!(
            "no sources config found (set {} or provide {})",
            ENV_SOURCES_PATH,
            DEFAULT_SOURCES_PATH
        ))
    }

    pub fn get(&self, name: &str) -> Option<&SourceConfig> {
        self.sources.iter().find(|s| s.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SourceConfig> {
        self.sources.iter()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}
