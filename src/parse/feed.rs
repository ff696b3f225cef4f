// src/parse/feed.rs
// RSS/XML feed shape: extract `item` nodes and their title/description/
// link/pubDate sub-elements.

use quick_xml::de::from_str;
use serde::Deserialize;

use crate::error::ParseError;
use crate::model::AlertDraft;
use crate::parse::{normalize_text, ParsedBatch, PayloadParser};
use crate::registry::SourceConfig;

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    item: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    description: Option<String>,
    guid: Option<String>,
}

pub struct FeedParser;

impl PayloadParser for FeedParser {
    fn parse(&self, body: &str, src: &SourceConfig) -> Result<ParsedBatch, ParseError> {
        let xml_clean = scrub_html_entities_for_xml(body);
        let rss: Rss = from_str(&xml_clean).map_err(|e| ParseError::Malformed {
            source_name: src.name.clone(),
            shape: "feed",
            reason: e.to_string(),
        })?;

        let mut batch = ParsedBatch::default();
        for it in rss.channel.item {
            // An item without a title or link is not a navigable notice.
            let (Some(title), Some(link)) = (it.title.as_deref(), it.link.as_deref()) else {
                batch.malformed += 1;
                continue;
            };
            let title = normalize_text(title);
            if title.is_empty() {
                batch.malformed += 1;
                continue;
            }

            let raw_payload = serde_json::json!({
                "title": it.title,
                "link": it.link,
                "pubDate": it.pub_date,
                "description": it.description,
                "guid": it.guid,
            });

            batch.drafts.push(AlertDraft {
                title,
                description: normalize_text(it.description.as_deref().unwrap_or_default()),
                link: Some(link.trim().to_string()),
                raw_date: it.pub_date.clone(),
                external_id: it.guid.clone().filter(|g| !g.trim().is_empty()),
                raw_payload,
            });
        }
        Ok(batch)
    }
}

/// Feeds routinely embed bare HTML entities that are invalid XML; scrub the
/// common ones before handing the document to the XML parser.
fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
}
