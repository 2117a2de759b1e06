//! Retrieval types and configuration.

use serde::Serialize;
use sitegist_store::ChunkType;

/// Retrieval knobs. The blend between raw text relevance and structural
/// priority/type weighting is a tunable policy, so the weights live here
/// rather than in code.
#[derive(Debug, Clone)]
pub struct RetrieverConfig {
    /// Result-count bound `k`.
    pub limit: usize,
    /// Candidate pool is `limit * candidate_multiplier` (at least 3x) to
    /// leave re-ranking headroom.
    pub candidate_multiplier: usize,
    /// Optional per-page diversity cap: max chunks per distinct page.
    pub max_chunks_per_page: Option<usize>,
    /// Type weights; title outranks heading outranks content.
    pub title_weight: f64,
    pub heading_weight: f64,
    pub content_weight: f64,
    /// Slope of the priority factor `1 + priority * priority_weight`.
    pub priority_weight: f64,
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self {
            limit: 5,
            candidate_multiplier: 3,
            max_chunks_per_page: None,
            title_weight: 2.0,
            heading_weight: 1.5,
            content_weight: 1.0,
            priority_weight: 0.05,
        }
    }
}

impl RetrieverConfig {
    pub fn type_weight(&self, chunk_type: ChunkType) -> f64 {
        match chunk_type {
            ChunkType::Title => self.title_weight,
            ChunkType::Heading => self.heading_weight,
            ChunkType::Content => self.content_weight,
        }
    }

    /// Monotonically increasing in the stored priority field.
    pub fn priority_factor(&self, priority: i32) -> f64 {
        1.0 + priority as f64 * self.priority_weight
    }
}

/// A retrieval result: one chunk with its raw store score and the composite
/// score it was ranked by.
#[derive(Debug, Clone, Serialize)]
pub struct RankedChunk {
    pub chunk_id: i64,
    pub page_id: i64,
    pub url: String,
    pub text: String,
    pub chunk_type: ChunkType,
    pub priority: i32,
    pub chunk_order: i32,
    /// Raw full-text relevance from the store.
    pub store_score: f64,
    /// `store_score * type_weight * priority_factor`.
    pub score: f64,
}
