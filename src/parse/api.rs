// src/parse/api.rs
// Structured-API shape: JSON records mapped through per-source field-name
// aliases.

use serde_json::Value;

use crate::error::ParseError;
use crate::model::AlertDraft;
use crate::parse::{normalize_text, ParsedBatch, PayloadParser};
use crate::registry::{ApiFields, SourceConfig};

pub struct ApiParser;

impl PayloadParser for ApiParser {
    fn parse(&self, body: &str, src: &SourceConfig) -> Result<ParsedBatch, ParseError> {
        let value: Value = serde_json::from_str(body).map_err(|e| ParseError::Malformed {
            source_name: src.name.clone(),
            shape: "api",
            reason: e.to_string(),
        })?;

        let fields: ApiFields = src.api.clone().unwrap_or_default();
        let items = extract_items(&value, fields.items_path.as_deref()).ok_or_else(|| {
            ParseError::Malformed {
                source_name: src.name.clone(),
                shape: "api",
                reason: "no record array found in payload".into(),
            }
        })?;

        let mut batch = ParsedBatch::default();
        for item in items {
            let Some(obj) = item.as_object() else {
                batch.malformed += 1;
                continue;
            };
            let Some(title_raw) = first_string(obj, &fields.title) else {
                batch.malformed += 1;
                continue;
            };
            let title = normalize_text(&title_raw);
            if title.is_empty() {
                batch.malformed += 1;
                continue;
            }

            batch.drafts.push(AlertDraft {
                title,
                description: first_string(obj, &fields.description)
                    .map(|d| normalize_text(&d))
                    .unwrap_or_default(),
                link: first_string(obj, &fields.link),
                raw_date: first_string(obj, &fields.date),
                external_id: first_string(obj, &fields.id),
                raw_payload: item.clone(),
            });
        }
        Ok(batch)
    }
}

/// Locate the record array: configured path, payload root, or one of the
/// envelope keys agencies commonly use.
fn extract_items<'a>(value: &'a Value, items_path: Option<&str>) -> Option<&'a Vec<Value>> {
    if let Some(path) = items_path {
        return value.get(path)?.as_array();
    }
    if let Some(arr) = value.as_array() {
        return Some(arr);
    }
    for key in ["results", "items", "data", "records"] {
        if let Some(arr) = value.get(key).and_then(Value::as_array) {
            return Some(arr);
        }
    }
    None
}

fn first_string(obj: &serde_json::Map<String, Value>, aliases: &[String]) -> Option<String> {
    for alias in aliases {
        match obj.get(alias) {
            Some(Value::String(s)) if !s.trim().is_empty() => return Some(s.clone()),
            Some(Value::Number(n)) => return Some(n.to_string()),
            _ => {}
        }
    }
    None
}
