//! Page chunking — one page record in, an ordered typed chunk set out.
//!
//! Emission order is fixed: title, headings in document order, body content
//! windows, then the folded metadata chunk. `chunk_order` is a strictly
//! increasing counter over that sequence, so reading order can be
//! reconstructed and equal-score retrieval ties resolve deterministically.

use once_cell::sync::Lazy;
use regex::Regex;

use sitegist_core::{Error, Result};
use sitegist_store::{ChunkType, NewChunk, Page, PageStatus};

/// Intrinsic importance per chunk kind; larger is more important.
pub const PRIORITY_TITLE: i32 = 10;
pub const PRIORITY_HEADING: i32 = 8;
pub const PRIORITY_CONTENT: i32 = 5;
pub const PRIORITY_METADATA: i32 = 3;

/// Default target size for body content windows, in characters.
pub const DEFAULT_TARGET_CHUNK_SIZE: usize = 300;
/// Default overlap budget carried between consecutive content windows.
pub const DEFAULT_CHUNK_OVERLAP: usize = 60;
/// Fragments shorter than this are dropped.
pub const DEFAULT_MIN_CHUNK_LEN: usize = 15;
/// Hard upper bound; longer fragments are split at character windows.
pub const DEFAULT_MAX_CHUNK_LEN: usize = 1_200;

/// Paragraph breaks and bullet/pipe separators mark major boundaries.
static MAJOR_SPLIT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n{2,}|\s*•\s*|\s+\|\s+").unwrap());

/// A sentence-ish run: text up to (and including) terminal punctuation.
static SENTENCE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^.!?]+[.!?]*").unwrap());

/// Chunking knobs.
#[derive(Debug, Clone)]
pub struct ChunkerConfig {
    pub target_chunk_size: usize,
    pub chunk_overlap: usize,
    pub min_chunk_len: usize,
    pub max_chunk_len: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            target_chunk_size: DEFAULT_TARGET_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            min_chunk_len: DEFAULT_MIN_CHUNK_LEN,
            max_chunk_len: DEFAULT_MAX_CHUNK_LEN,
        }
    }
}

/// Transforms one page record into an ordered sequence of typed chunks.
pub struct PageChunker {
    config: ChunkerConfig,
}

impl PageChunker {
    pub fn new(config: ChunkerConfig) -> Self {
        Self { config }
    }

    /// Chunk a successfully extracted page.
    ///
    /// Fails with `InvalidPageState` if the page status is not success or if
    /// every text field is blank. The output is deterministic for identical
    /// input and is not yet persisted.
    pub fn chunk_page(&self, page: &Page) -> Result<Vec<NewChunk>> {
        if page.status != PageStatus::Success {
            return Err(Error::InvalidPageState {
                page_id: page.id,
                reason: format!("has status {}, expected success", page.status.as_str()),
            });
        }
        if page.is_empty() {
            return Err(Error::InvalidPageState {
                page_id: page.id,
                reason: "has no text content".into(),
            });
        }

        let mut chunks = Vec::new();
        let mut order: i32 = 0;
        let mut push = |chunks: &mut Vec<NewChunk>, text: String, chunk_type: ChunkType, priority: i32| {
            chunks.push(NewChunk {
                text,
                chunk_type,
                priority,
                chunk_order: order,
            });
            order += 1;
        };

        let title = page.title.trim();
        if !title.is_empty() {
            push(&mut chunks, title.to_string(), ChunkType::Title, PRIORITY_TITLE);
        }

        for heading in page.heading_lines() {
            push(&mut chunks, heading.to_string(), ChunkType::Heading, PRIORITY_HEADING);
        }

        for fragment in self.split_body(&page.body) {
            push(&mut chunks, fragment, ChunkType::Content, PRIORITY_CONTENT);
        }

        // Metadata often carries named entities (description, keywords), so
        // it is folded into one low-priority content chunk instead of being
        // discarded.
        let metadata = page.metadata.trim();
        if char_len(metadata) >= self.config.min_chunk_len {
            for fragment in hard_split(metadata, self.config.max_chunk_len).into_iter().take(1) {
                push(&mut chunks, fragment, ChunkType::Content, PRIORITY_METADATA);
            }
        }

        Ok(chunks)
    }

    /// Split body text into content windows over semantic boundaries:
    /// paragraph/bullet breaks first, then sentence accumulation up to the
    /// target size with a sentence-tail overlap between consecutive windows.
    fn split_body(&self, body: &str) -> Vec<String> {
        let mut fragments = Vec::new();

        for section in MAJOR_SPLIT_RE.split(body) {
            let section = section.trim();
            if char_len(section) < self.config.min_chunk_len {
                continue;
            }
            if char_len(section) <= self.config.target_chunk_size {
                fragments.push(section.to_string());
            } else {
                fragments.extend(self.window_sentences(section));
            }
        }

        // Dedup repeated fragments (boilerplate repeats across sections) and
        // enforce the length bounds.
        let mut seen = std::collections::HashSet::new();
        let mut result = Vec::new();
        for fragment in fragments {
            for piece in hard_split(&fragment, self.config.max_chunk_len) {
                let piece = piece.trim().to_string();
                if char_len(&piece) < self.config.min_chunk_len {
                    continue;
                }
                let key = piece.to_lowercase();
                if seen.insert(key) {
                    result.push(piece);
                }
            }
        }
        result
    }

    /// Accumulate sentences into windows of at most `target_chunk_size`
    /// characters, carrying the previous window's final sentence into the
    /// next window when it fits the overlap budget.
    fn window_sentences(&self, section: &str) -> Vec<String> {
        let mut windows = Vec::new();
        let mut current = String::new();
        let mut last_sentence = String::new();

        for m in SENTENCE_RE.find_iter(section) {
            let sentence = m.as_str().trim();
            if sentence.is_empty() {
                continue;
            }

            if !current.is_empty()
                && char_len(&current) + 1 + char_len(sentence) > self.config.target_chunk_size
            {
                let carry = if self.config.chunk_overlap > 0
                    && char_len(&last_sentence) <= self.config.chunk_overlap
                    && last_sentence != current
                {
                    Some(last_sentence.clone())
                } else {
                    None
                };
                windows.push(std::mem::take(&mut current));
                if let Some(tail) = carry {
                    current = tail;
                }
            }

            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(sentence);
            last_sentence = sentence.to_string();
        }

        if !current.is_empty() {
            windows.push(current);
        }
        windows
    }
}

impl Default for PageChunker {
    fn default() -> Self {
        Self::new(ChunkerConfig::default())
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Split text into pieces of at most `max_len` characters.
fn hard_split(text: &str, max_len: usize) -> Vec<String> {
    if char_len(text) <= max_len {
        return vec![text.to_string()];
    }
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(max_len)
        .map(|window| window.iter().collect())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn success_page(title: &str, headings: &str, body: &str, metadata: &str) -> Page {
        Page {
            id: 1,
            url: "https://acme.test/".into(),
            title: title.into(),
            headings: headings.into(),
            body: body.into(),
            metadata: metadata.into(),
            status: PageStatus::Success,
            content_hash: None,
            created_at: 0,
            updated_at: None,
        }
    }

    #[test]
    fn test_emission_order_and_types() {
        let chunker = PageChunker::default();
        let page = success_page(
            "Acme Corp",
            "About Us\nLeadership Team",
            "Jane Doe is the CEO of Acme Corp. The company was founded in 1949.",
            "description: Acme Corp official site",
        );
        let chunks = chunker.chunk_page(&page).unwrap();

        assert_eq!(chunks[0].chunk_type, ChunkType::Title);
        assert_eq!(chunks[0].text, "Acme Corp");
        assert_eq!(chunks[0].priority, PRIORITY_TITLE);

        assert_eq!(chunks[1].chunk_type, ChunkType::Heading);
        assert_eq!(chunks[1].text, "About Us");
        assert_eq!(chunks[2].text, "Leadership Team");

        assert!(chunks[3..].iter().all(|c| c.chunk_type == ChunkType::Content));
        assert_eq!(chunks.last().unwrap().priority, PRIORITY_METADATA);
        assert!(chunks.last().unwrap().text.contains("official site"));

        // chunk_order strictly increasing in emission order.
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.chunk_order, i as i32);
        }
    }

    #[test]
    fn test_short_body_single_content_chunk() {
        let chunker = PageChunker::default();
        let page = success_page("", "", "Jane Doe is the CEO of Acme Corp.", "");
        let chunks = chunker.chunk_page(&page).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].chunk_type, ChunkType::Content);
        assert_eq!(chunks[0].text, "Jane Doe is the CEO of Acme Corp.");
    }

    #[test]
    fn test_windows_overlap() {
        let chunker = PageChunker::new(ChunkerConfig {
            target_chunk_size: 80,
            chunk_overlap: 40,
            ..ChunkerConfig::default()
        });
        let body = "The first fact is about anvils. The second fact is about dynamite. \
                    The third fact is about tunnels. The fourth fact is about birds.";
        let page = success_page("", "", body, "");
        let chunks = chunker.chunk_page(&page).unwrap();
        assert!(chunks.len() >= 2);

        // The last sentence of one window reappears at the head of the next.
        let first = &chunks[0].text;
        let second = &chunks[1].text;
        let tail = first.rsplit(". ").next().unwrap().trim_end_matches('.');
        assert!(second.contains(tail));
    }

    #[test]
    fn test_paragraph_and_bullet_splits() {
        let chunker = PageChunker::default();
        let body = "First paragraph about the company history.\n\n\
                    Second paragraph about current products. • Bullet item describing services.";
        let page = success_page("", "", body, "");
        let chunks = chunker.chunk_page(&page).unwrap();
        assert_eq!(chunks.len(), 3);
        assert!(chunks[0].text.starts_with("First paragraph"));
        assert!(chunks[2].text.starts_with("Bullet item"));
    }

    #[test]
    fn test_min_length_and_dedup() {
        let chunker = PageChunker::default();
        let body = "Repeated boilerplate sentence here.\n\nok\n\nRepeated boilerplate sentence here.";
        let page = success_page("", "", body, "");
        let chunks = chunker.chunk_page(&page).unwrap();
        assert_eq!(chunks.len(), 1);
    }

    #[test]
    fn test_oversentence_hard_split() {
        let chunker = PageChunker::new(ChunkerConfig {
            target_chunk_size: 50,
            max_chunk_len: 100,
            ..ChunkerConfig::default()
        });
        let body = "x".repeat(350);
        let page = success_page("", "", &body, "");
        let chunks = chunker.chunk_page(&page).unwrap();
        assert!(chunks.len() >= 3);
        assert!(chunks.iter().all(|c| c.text.chars().count() <= 100));
    }

    #[test]
    fn test_non_success_status_rejected() {
        let chunker = PageChunker::default();
        let mut page = success_page("Acme Corp", "", "Some body text here.", "");
        page.status = PageStatus::Pending;
        let result = chunker.chunk_page(&page);
        assert!(matches!(result, Err(Error::InvalidPageState { .. })));
    }

    #[test]
    fn test_empty_page_rejected() {
        let chunker = PageChunker::default();
        let page = success_page("", "", "", "   ");
        let result = chunker.chunk_page(&page);
        assert!(matches!(result, Err(Error::InvalidPageState { .. })));
    }

    #[test]
    fn test_deterministic() {
        let chunker = PageChunker::default();
        let page = success_page(
            "Acme Corp",
            "Products",
            "Acme sells anvils. Acme sells dynamite. Acme sells rocket skates.",
            "keywords: anvils, dynamite",
        );
        let a = chunker.chunk_page(&page).unwrap();
        let b = chunker.chunk_page(&page).unwrap();
        let texts_a: Vec<_> = a.iter().map(|c| (&c.text, c.chunk_order)).collect();
        let texts_b: Vec<_> = b.iter().map(|c| (&c.text, c.chunk_order)).collect();
        assert_eq!(texts_a, texts_b);
    }
}
