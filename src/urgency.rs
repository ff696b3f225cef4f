// src/urgency.rs
// Urgency classifier: ordered keyword heuristics, first match wins. This is
// deterministic on purpose; downstream test parity depends on the exact
// keyword sets and precedence.

use crate::model::Urgency;

/// High-tier phrases: active harm or formal sanctions.
const HIGH_KEYWORDS: &[&str] = &[
    "recall",
    "contamination",
    "contaminated",
    "outbreak",
    "fatality",
    "death",
    "citation",
    "violation",
    "do not eat",
    "do not use",
    "hazard alert",
];

/// Medium-tier phrases: regulator activity short of immediate harm.
const MEDIUM_KEYWORDS: &[&str] = &[
    "advisory",
    "enforcement",
    "inspection",
    "guidance update",
    "warning letter",
    "compliance",
    "proposed rule",
];

/// Classify draft text against the tiers in precedence order; fall back to
/// the source's configured baseline when nothing fires.
pub fn classify(text: &str, source_default: Urgency) -> Urgency {
    let lower = text.to_lowercase();
    if HIGH_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
        return Urgency::High;
    }
    if MEDIUM_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
        return Urgency::Medium;
    }
    source_default
}
