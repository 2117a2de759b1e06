//! Query-time retrieval: normalize, search, re-rank, diversify, truncate.

use std::collections::HashMap;

use tracing::debug;

use crate::types::{RankedChunk, RetrieverConfig};
use sitegist_core::Result;
use sitegist_store::{SearchHit, SqliteStore};

/// Converts a free-text query into a ranked, bounded chunk list.
pub struct Retriever {
    config: RetrieverConfig,
}

impl Retriever {
    pub fn new(config: RetrieverConfig) -> Self {
        Self { config }
    }

    /// Retrieve the top chunks for a query, bounded by the configured limit.
    pub fn retrieve(&self, store: &SqliteStore, query: &str) -> Result<Vec<RankedChunk>> {
        self.retrieve_with_limit(store, query, self.config.limit)
    }

    /// Retrieve with a per-call result bound (e.g., a request-supplied
    /// context limit).
    ///
    /// Deterministic for identical store state and query. Zero matches (or a
    /// query that normalizes to nothing) return an empty list; callers treat
    /// that as insufficient grounding, not an error.
    pub fn retrieve_with_limit(
        &self,
        store: &SqliteStore,
        query: &str,
        limit: usize,
    ) -> Result<Vec<RankedChunk>> {
        let normalized = normalize_query(query);
        if normalized.is_empty() {
            return Ok(Vec::new());
        }

        let candidate_bound = limit * self.config.candidate_multiplier.max(3);
        let candidates = store.search(&normalized, candidate_bound)?;
        debug!(
            "Query '{}' matched {} candidates (bound {})",
            normalized,
            candidates.len(),
            candidate_bound
        );

        let mut ranked: Vec<RankedChunk> =
            candidates.into_iter().map(|hit| self.score(hit)).collect();

        // Composite score descending; ties go to earlier in-page position
        // (lead paragraphs win), then chunk id for full determinism.
        ranked.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.chunk_order.cmp(&b.chunk_order))
                .then_with(|| a.chunk_id.cmp(&b.chunk_id))
        });

        let mut per_page: HashMap<i64, usize> = HashMap::new();
        let mut results = Vec::with_capacity(limit);
        for chunk in ranked {
            if let Some(cap) = self.config.max_chunks_per_page {
                let count = per_page.entry(chunk.page_id).or_insert(0);
                if *count >= cap {
                    continue;
                }
                *count += 1;
            }
            results.push(chunk);
            if results.len() >= limit {
                break;
            }
        }

        Ok(results)
    }

    fn score(&self, hit: SearchHit) -> RankedChunk {
        let score = hit.score
            * self.config.type_weight(hit.chunk_type)
            * self.config.priority_factor(hit.priority);
        RankedChunk {
            chunk_id: hit.chunk_id,
            page_id: hit.page_id,
            url: hit.url,
            text: hit.text,
            chunk_type: hit.chunk_type,
            priority: hit.priority,
            chunk_order: hit.chunk_order,
            store_score: hit.score,
            score,
        }
    }
}

impl Default for Retriever {
    fn default() -> Self {
        Self::new(RetrieverConfig::default())
    }
}

/// Lowercase, strip punctuation, and drop single-character tokens.
fn normalize_query(query: &str) -> String {
    let cleaned: String = query
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    cleaned
        .split_whitespace()
        .filter(|t| t.chars().count() >= 2)
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use sitegist_store::{ChunkType, NewChunk, NewPage};
    use tempfile::TempDir;

    fn test_store() -> (SqliteStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = SqliteStore::open(dir.path()).unwrap();
        (store, dir)
    }

    fn chunk(text: &str, chunk_type: ChunkType, priority: i32, order: i32) -> NewChunk {
        NewChunk {
            text: text.into(),
            chunk_type,
            priority,
            chunk_order: order,
        }
    }

    /// Helper: store a page with a title chunk and a few content chunks.
    fn add_page(store: &SqliteStore, url: &str, title: &str, contents: &[&str]) -> i64 {
        let page_id = store
            .upsert_page(&NewPage {
                url: url.into(),
                title: title.into(),
                body: contents.join(" "),
                ..Default::default()
            })
            .unwrap()
            .page_id;

        let mut chunks = vec![chunk(title, ChunkType::Title, 10, 0)];
        for (i, text) in contents.iter().enumerate() {
            chunks.push(chunk(text, ChunkType::Content, 5, i as i32 + 1));
        }
        store.replace_chunks(page_id, &chunks).unwrap();
        page_id
    }

    #[test]
    fn test_normalize_query() {
        assert_eq!(normalize_query("Who is the CEO?"), "who is the ceo");
        assert_eq!(normalize_query("  Acme-Corp!!  "), "acme corp");
        assert_eq!(normalize_query("a ? !"), "");
        assert_eq!(normalize_query(""), "");
    }

    #[test]
    fn test_empty_query_returns_empty() {
        let (store, _dir) = test_store();
        add_page(&store, "https://acme.test/", "Acme Corp", &["Some content here."]);

        let retriever = Retriever::default();
        assert!(retriever.retrieve(&store, "").unwrap().is_empty());
        assert!(retriever.retrieve(&store, "?!").unwrap().is_empty());
    }

    #[test]
    fn test_no_matches_is_empty_not_error() {
        let (store, _dir) = test_store();
        add_page(&store, "https://acme.test/", "Acme Corp", &["Anvils and dynamite."]);

        let retriever = Retriever::default();
        let results = retriever.retrieve(&store, "quantum chromodynamics").unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn test_title_query_ranks_title_first() {
        let (store, _dir) = test_store();
        add_page(
            &store,
            "https://acme.test/",
            "Acme Corp",
            &[
                "Acme Corp builds rocket-powered roller skates for discerning coyotes.",
                "The Acme Corp catalog ships worldwide from the desert.",
            ],
        );

        let retriever = Retriever::default();
        let results = retriever.retrieve(&store, "Acme Corp").unwrap();
        assert!(!results.is_empty());
        assert_eq!(results[0].chunk_type, ChunkType::Title);
        assert_eq!(results[0].text, "Acme Corp");
    }

    #[test]
    fn test_composite_weights_affect_order() {
        let (store, _dir) = test_store();
        let page_id = store
            .upsert_page(&NewPage {
                url: "https://acme.test/weights".into(),
                title: "Weights".into(),
                body: "body".into(),
                ..Default::default()
            })
            .unwrap()
            .page_id;
        // Same text so the raw FTS score is identical; type/priority decides.
        store
            .replace_chunks(
                page_id,
                &[
                    chunk("identical relevance text", ChunkType::Content, 5, 0),
                    chunk("identical relevance text", ChunkType::Heading, 8, 1),
                ],
            )
            .unwrap();

        let retriever = Retriever::default();
        let results = retriever.retrieve(&store, "identical relevance").unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].chunk_type, ChunkType::Heading);
        assert!(results[0].score > results[1].score);
    }

    #[test]
    fn test_tie_break_by_chunk_order() {
        let (store, _dir) = test_store();
        let page_id = store
            .upsert_page(&NewPage {
                url: "https://acme.test/ties".into(),
                title: "Ties".into(),
                body: "body".into(),
                ..Default::default()
            })
            .unwrap()
            .page_id;
        store
            .replace_chunks(
                page_id,
                &[
                    chunk("repeated passage about anvils", ChunkType::Content, 5, 3),
                    chunk("repeated passage about anvils", ChunkType::Content, 5, 7),
                ],
            )
            .unwrap();

        let retriever = Retriever::default();
        let results = retriever.retrieve(&store, "repeated passage").unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].chunk_order, 3);
        assert_eq!(results[1].chunk_order, 7);
    }

    #[test]
    fn test_diversity_cap() {
        let (store, _dir) = test_store();
        add_page(
            &store,
            "https://acme.test/a",
            "Anvil Encyclopedia",
            &[
                "Anvils are heavy. Anvils are iron.",
                "Anvil maintenance requires anvil polish.",
                "The anvil catalog lists every anvil.",
            ],
        );
        add_page(
            &store,
            "https://acme.test/b",
            "Anvil History",
            &["The first anvil was forged long ago."],
        );

        let retriever = Retriever::new(RetrieverConfig {
            max_chunks_per_page: Some(1),
            ..RetrieverConfig::default()
        });
        let results = retriever.retrieve(&store, "anvil").unwrap();

        let mut pages_seen = std::collections::HashSet::new();
        for r in &results {
            assert!(pages_seen.insert(r.page_id), "page {} appears twice", r.page_id);
        }
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn test_limit_truncation() {
        let (store, _dir) = test_store();
        add_page(
            &store,
            "https://acme.test/many",
            "Dynamite Digest",
            &[
                "Dynamite fact one.",
                "Dynamite fact two.",
                "Dynamite fact three.",
                "Dynamite fact four.",
            ],
        );

        let retriever = Retriever::new(RetrieverConfig {
            limit: 2,
            ..RetrieverConfig::default()
        });
        let results = retriever.retrieve(&store, "dynamite").unwrap();
        assert_eq!(results.len(), 2);

        // A per-call bound overrides the configured one.
        let results = retriever.retrieve_with_limit(&store, "dynamite", 3).unwrap();
        assert_eq!(results.len(), 3);
    }

    #[test]
    fn test_deterministic_for_same_state() {
        let (store, _dir) = test_store();
        add_page(
            &store,
            "https://acme.test/",
            "Acme Corp",
            &["Jane Doe is the CEO of Acme Corp.", "Acme sells anvils."],
        );

        let retriever = Retriever::default();
        let a: Vec<i64> = retriever
            .retrieve(&store, "acme")
            .unwrap()
            .iter()
            .map(|r| r.chunk_id)
            .collect();
        let b: Vec<i64> = retriever
            .retrieve(&store, "acme")
            .unwrap()
            .iter()
            .map(|r| r.chunk_id)
            .collect();
        assert_eq!(a, b);
    }
}
