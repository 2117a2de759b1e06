//! Error types for sitegist.
//!
//! Empty-query, no-results, and context-overflow conditions are represented
//! as empty values by the components that produce them, never as variants
//! here, so the answering layer can emit an explicit "no information found"
//! response instead of handling exceptions.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Chunking was attempted on a page that is not ready for it. The caller
    /// must re-scrape the page first; this is never retried internally.
    #[error("invalid page state: page {page_id} {reason}")]
    InvalidPageState { page_id: i64, reason: String },

    /// Storage-layer failure (open, query, transaction). Safe to retry with
    /// backoff at the caller.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// A chunk set violating the non-empty-text or strictly-increasing-order
    /// invariants was handed to the store.
    #[error("invalid chunk: {0}")]
    InvalidChunk(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;
