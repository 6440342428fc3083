// Context assembly module
// Turns ranked search hits into a bounded block of text for a generator


use std::collections::HashSet;

use tracing::debug;

use crate::index::SearchHit;

/// Character budget used when the caller does not set one
pub const DEFAULT_MAX_CONTEXT_CHARS: usize = 800;

const SEPARATOR: &str = "\n\n";

/// Retrieved chunk texts, ready to be placed in a prompt
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetrievedContext {
    pub text: String,
    /// Distinct sources of the hits whose text made it into `text`, in rank order
    pub sources: Vec<String>,
    pub truncated: bool,
}

impl RetrievedContext {
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Join hit texts in rank order, dropping repeated texts, and cut the result
/// to at most `max_chars` characters.
#[inline]
pub fn build_context(hits: &[SearchHit], max_chars: usize) -> RetrievedContext {
    let mut seen_texts = HashSet::new();
    let mut parts: Vec<&SearchHit> = Vec::new();

    for hit in hits {
        if seen_texts.insert(hit.chunk.text.as_str()) {
            parts.push(hit);
        }
    }

    let joined = parts
        .iter()
        .map(|hit| hit.chunk.text.as_str())
        .collect::<Vec<_>>()
        .join(SEPARATOR);
    let (text, truncated) = truncate_chars(&joined, max_chars);

    // Byte offset where each part starts in `joined`; `text` is a prefix of it
    let mut seen_sources = HashSet::new();
    let mut sources = Vec::new();
    let mut start = 0;
    for hit in &parts {
        if start >= text.len() {
            break;
        }
        if seen_sources.insert(hit.chunk.source.as_str()) {
            sources.push(hit.chunk.source.clone());
        }
        start += hit.chunk.text.len() + SEPARATOR.len();
    }

    debug!(
        "Built context from {} of {} hits ({} chars, {} sources, truncated: {})",
        parts.len(),
        hits.len(),
        text.chars().count(),
        sources.len(),
        truncated
    );

    RetrievedContext {
        text,
        sources,
        truncated,
    }
}

/// Cut `text` to `max_chars` characters, at the last newline inside the limit
/// when there is one
fn truncate_chars(text: &str, max_chars: usize) -> (String, bool) {
    let Some((limit, _)) = text.char_indices().nth(max_chars) else {
        return (text.to_string(), false);
    };

    let head = &text[..limit];
    let cut = head
        .rfind('\n')
        .filter(|position| *position > 0)
        .map_or(head, |position| &head[..position]);

    (cut.trim_end().to_string(), true)
}
