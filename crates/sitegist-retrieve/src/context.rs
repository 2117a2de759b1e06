//! Context assembly: ranked chunks in, one bounded text block out.

use std::collections::HashSet;

use serde::Serialize;

use crate::types::RankedChunk;

/// Default character budget for an assembled context.
pub const DEFAULT_MAX_CONTEXT_CHARS: usize = 4_000;

/// Assembly knobs.
#[derive(Debug, Clone)]
pub struct ContextConfig {
    /// Maximum total characters of chunk text. Provenance markers are
    /// overhead outside the budget.
    pub max_context_chars: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_context_chars: DEFAULT_MAX_CONTEXT_CHARS,
        }
    }
}

/// An assembled context block plus the chunks that made it in, for
/// citation and debugging.
#[derive(Debug, Clone, Serialize)]
pub struct AssembledContext {
    pub text: String,
    pub included: Vec<RankedChunk>,
}

impl AssembledContext {
    /// True when nothing fit the budget or nothing was retrieved; the
    /// caller should answer "no information found" instead of invoking the
    /// generator with empty input.
    pub fn is_empty(&self) -> bool {
        self.included.is_empty()
    }

    /// Distinct source URLs of the included chunks, in ranked order.
    pub fn source_urls(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.included
            .iter()
            .filter(|c| seen.insert(c.url.as_str()))
            .map(|c| c.url.as_str())
            .collect()
    }
}

/// Turns a ranked chunk list into a single bounded context string.
pub struct ContextAssembler {
    config: ContextConfig,
}

impl ContextAssembler {
    pub fn new(config: ContextConfig) -> Self {
        Self { config }
    }

    /// Walk chunks in ranked order, appending each chunk (with a light
    /// provenance marker) while the running total of chunk text stays within
    /// budget. A chunk that would overflow is skipped whole rather than
    /// truncated, and the walk continues with later, smaller chunks.
    /// Duplicate `(page_id, chunk_order)` pairs are dropped.
    ///
    /// Pure and idempotent for identical input and budget.
    pub fn assemble(&self, ranked: &[RankedChunk]) -> AssembledContext {
        let mut seen: HashSet<(i64, i32)> = HashSet::new();
        let mut total = 0usize;
        let mut text = String::new();
        let mut included = Vec::new();

        for chunk in ranked {
            if !seen.insert((chunk.page_id, chunk.chunk_order)) {
                continue;
            }
            let len = chunk.text.chars().count();
            if total + len > self.config.max_context_chars {
                continue;
            }
            total += len;

            text.push_str(&format!(
                "[{} | {}]\n{}\n\n",
                chunk.url,
                chunk.chunk_type.as_str(),
                chunk.text
            ));
            included.push(chunk.clone());
        }

        AssembledContext {
            text: text.trim_end().to_string(),
            included,
        }
    }
}

impl Default for ContextAssembler {
    fn default() -> Self {
        Self::new(ContextConfig::default())
    }
}
