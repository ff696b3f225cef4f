// src/parse/html.rs
// HTML shape: candidate item containers selected via configured CSS
// selectors, sub-selectors for link/title/date/summary.

use scraper::{ElementRef, Html, Selector};

use crate::error::ParseError;
use crate::model::AlertDraft;
use crate::parse::{normalize_text, ParsedBatch, PayloadParser, MIN_HTML_TITLE_CHARS};
use crate::registry::SourceConfig;

pub struct HtmlParser;

impl PayloadParser for HtmlParser {
    fn parse(&self, body: &str, src: &SourceConfig) -> Result<ParsedBatch, ParseError> {
        let Some(sel) = &src.html else {
            return Err(ParseError::Malformed {
                source_name: src.name.clone(),
                shape: "html",
                reason: "source declares html shape but no selectors".into(),
            });
        };

        let item_sel = compile(&src.name, &sel.item)?;
        let title_sel = compile(&src.name, &sel.title)?;
        let link_sel = compile(&src.name, &sel.link)?;
        let date_sel = sel.date.as_deref().map(|s| compile(&src.name, s)).transpose()?;
        let summary_sel = sel
            .summary
            .as_deref()
            .map(|s| compile(&src.name, s))
            .transpose()?;

        let document = Html::parse_document(body);
        let mut batch = ParsedBatch::default();

        for item in document.select(&item_sel) {
            let title = item
                .select(&title_sel)
                .next()
                .map(|el| normalize_text(&text_of(el)))
                .unwrap_or_default();
            // Short titles are nav/menu noise.
            if title.chars().count() < MIN_HTML_TITLE_CHARS {
                batch.malformed += 1;
                continue;
            }

            let link = item.select(&link_sel).next().and_then(href_of);
            let raw_date = date_sel
                .as_ref()
                .and_then(|s| item.select(s).next())
                .map(|el| text_of(el).trim().to_string());
            let description = summary_sel
                .as_ref()
                .and_then(|s| item.select(s).next())
                .map(|el| normalize_text(&text_of(el)))
                .unwrap_or_default();

            let raw_payload = serde_json::json!({ "html": item.html() });

            batch.drafts.push(AlertDraft {
                title,
                description,
                link,
                raw_date,
                external_id: None,
                raw_payload,
            });
        }
        Ok(batch)
    }
}

fn compile(source: &str, selector: &str) -> Result<Selector, ParseError> {
    Selector::parse(selector).map_err(|_| ParseError::BadSelector {
        source_name: source.to_string(),
        selector: selector.to_string(),
    })
}

fn text_of(el: ElementRef<'_>) -> String {
    el.text().collect::<Vec<_>>().join(" ")
}

/// The link element is either an anchor itself or wraps one.
fn href_of(el: ElementRef<'_>) -> Option<String> {
    if let Some(href) = el.value().attr("href") {
        return Some(href.trim().to_string());
    }
    let a = Selector::parse("a[href]").ok()?;
    el.select(&a)
        .next()
        .and_then(|a| a.value().attr("href"))
        .map(|h| h.trim().to_string())
}
