// src/relevance.rs
// Relevance gate: a draft survives only if any of the source's keywords
// appears (case-insensitively) in its title + description. Irrelevant
// drafts are silently filtered and counted, never logged as errors.

use crate::model::AlertDraft;

/// Empty keyword list means the source has no relevance constraint and
/// everything passes.
pub fn is_relevant(draft: &AlertDraft, keywords: &[String]) -> bool {
    if keywords.is_empty() {
        return true;
    }
    let haystack = draft.matchable_text().to_lowercase();
    keywords
        .iter()
        .any(|kw| !kw.is_empty() && haystack.contains(&kw.to_lowercase()))
}
