//! Data types for pages, chunks, and search results.

use serde::{Deserialize, Serialize};

/// Extraction lifecycle of a scraped page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageStatus {
    Pending,
    Success,
    Failed,
}

impl PageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PageStatus::Pending => "pending",
            PageStatus::Success => "success",
            PageStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(PageStatus::Pending),
            "success" => Some(PageStatus::Success),
            "failed" => Some(PageStatus::Failed),
            _ => None,
        }
    }
}

/// Structural kind of a chunk; drives base priority and retrieval weighting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkType {
    Title,
    Heading,
    Content,
}

impl ChunkType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChunkType::Title => "title",
            ChunkType::Heading => "heading",
            ChunkType::Content => "content",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "title" => Some(ChunkType::Title),
            "heading" => Some(ChunkType::Heading),
            "content" => Some(ChunkType::Content),
            _ => None,
        }
    }
}

/// A page row from the database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page {
    pub id: i64,
    pub url: String,
    pub title: String,
    /// Newline-separated heading strings in document order.
    pub headings: String,
    pub body: String,
    /// Free-form key/value text (description, keywords).
    pub metadata: String,
    pub status: PageStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,
    pub created_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<i64>,
}

impl Page {
    /// Headings as individual non-empty lines, in document order.
    pub fn heading_lines(&self) -> Vec<&str> {
        self.headings
            .lines()
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .collect()
    }

    /// True when every text field is blank.
    pub fn is_empty(&self) -> bool {
        self.title.trim().is_empty()
            && self.headings.trim().is_empty()
            && self.body.trim().is_empty()
            && self.metadata.trim().is_empty()
    }
}

/// Fields for inserting or overwriting a page by URL.
#[derive(Debug, Clone, Default)]
pub struct NewPage {
    pub url: String,
    pub title: String,
    pub headings: String,
    pub body: String,
    pub metadata: String,
}

/// Result of a page upsert.
#[derive(Debug, Clone, Copy)]
pub struct UpsertOutcome {
    pub page_id: i64,
    /// Whether the content hash differs from the previously stored page.
    /// Always true for a first insert.
    pub content_changed: bool,
}

/// A chunk row from the database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub id: i64,
    pub page_id: i64,
    pub text: String,
    pub chunk_type: ChunkType,
    pub priority: i32,
    pub chunk_order: i32,
    pub created_at: i64,
}

/// A chunk to be persisted by `replace_chunks`; produced by the chunker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewChunk {
    pub text: String,
    pub chunk_type: ChunkType,
    pub priority: i32,
    pub chunk_order: i32,
}

/// A full-text search candidate with its raw store relevance score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub chunk_id: i64,
    pub page_id: i64,
    pub url: String,
    pub text: String,
    pub chunk_type: ChunkType,
    pub priority: i32,
    pub chunk_order: i32,
    /// Negated FTS5 BM25 rank; larger is more relevant.
    pub score: f64,
}

/// Store-level statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreStats {
    pub total_pages: i64,
    pub success_pages: i64,
    pub failed_pages: i64,
    pub total_chunks: i64,
    pub title_chunks: i64,
    pub heading_chunks: i64,
    pub content_chunks: i64,
    pub db_path: String,
    pub db_size_mb: f64,
}
