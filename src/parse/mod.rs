// src/parse/mod.rs
// Parser/Normalizer: one `PayloadParser` per payload shape, all funneling
// into the same `AlertDraft`. A malformed item never fails the payload; it
// is skipped and counted.

pub mod api;
pub mod feed;
pub mod html;

use chrono::{DateTime, NaiveDate, Utc};
use time::format_description::well_known::Rfc2822;
use time::{OffsetDateTime, UtcOffset};

use crate::error::ParseError;
use crate::model::AlertDraft;
use crate::registry::{PayloadKind, SourceConfig};

/// Bounded summary length on the canonical record.
pub const SUMMARY_MAX_CHARS: usize = 500;

/// HTML items with shorter titles are nav-menu noise, not notices.
pub const MIN_HTML_TITLE_CHARS: usize = 10;

#[derive(Debug, Default)]
pub struct ParsedBatch {
    pub drafts: Vec<AlertDraft>,
    pub malformed: usize,
}

pub trait PayloadParser: Send + Sync {
    fn parse(&self, body: &str, src: &SourceConfig) -> Result<ParsedBatch, ParseError>;
}

/// Strategy selection off the source's declared shape.
pub fn parser_for(kind: PayloadKind) -> &'static dyn PayloadParser {
    match kind {
        PayloadKind::Api => &api::ApiParser,
        PayloadKind::Feed => &feed::FeedParser,
        PayloadKind::Html => &html::HtmlParser,
    }
}

/// Normalize text: decode entities, strip tags, collapse whitespace, trim.
pub fn normalize_text(s: &str) -> String {
    let mut out = html_escape::decode_html_entities(s).to_string();

    static RE_TAGS: once_cell::sync::OnceCell<regex::Regex> = once_cell::sync::OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, " ").to_string();

    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    static RE_WS: once_cell::sync::OnceCell<regex::Regex> = once_cell::sync::OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").unwrap());
    out = re_ws.replace_all(&out, " ").to_string();
    out.trim().to_string()
}

/// Char-boundary-safe truncation for summaries.
pub fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        s.chars().take(max).collect()
    }
}

/// Normalize a source-provided date to UTC. Agencies emit RFC2822 (feeds),
/// RFC3339, plain dates, and FDA's compact YYYYMMDD; anything unparsable
/// falls back to ingestion time.
pub fn parse_date(raw: Option<&str>, ingested_at: DateTime<Utc>) -> DateTime<Utc> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return ingested_at;
    };

    if let Ok(dt) = OffsetDateTime::parse(raw, &Rfc2822) {
        let unix = dt.to_offset(UtcOffset::UTC).unix_timestamp();
        if let Some(dt) = DateTime::from_timestamp(unix, 0) {
            return dt;
        }
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return dt.with_timezone(&Utc);
    }
    for fmt in ["%Y-%m-%d", "%Y%m%d", "%m/%d/%Y"] {
        if let Ok(d) = NaiveDate::parse_from_str(raw, fmt) {
            if let Some(dt) = d.and_hms_opt(0, 0, 0) {
                return DateTime::from_naive_utc_and_offset(dt, Utc);
            }
        }
    }
    ingested_at
}

/// Canonicalize an item link: resolve relative paths against the source's
/// base URL, pass absolute links through, drop the unresolvable.
pub fn resolve_link(link: Option<&str>, base: Option<&url::Url>) -> Option<String> {
    let link = link.map(str::trim).filter(|s| !s.is_empty())?;
    if let Ok(abs) = url::Url::parse(link) {
        return Some(abs.to_string());
    }
    base.and_then(|b| b.join(link).ok()).map(|u| u.to_string())
}
