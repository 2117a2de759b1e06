//! Chunk-and-store pipeline: page record → chunker → chunk store.

use tracing::{debug, info};

use crate::chunker::PageChunker;
use sitegist_core::{Error, Result};
use sitegist_store::SqliteStore;

/// Runs the chunker against stored pages and persists the result.
pub struct Ingester<'a> {
    store: &'a SqliteStore,
    chunker: PageChunker,
}

impl<'a> Ingester<'a> {
    pub fn new(store: &'a SqliteStore) -> Self {
        Self {
            store,
            chunker: PageChunker::default(),
        }
    }

    pub fn with_chunker(store: &'a SqliteStore, chunker: PageChunker) -> Self {
        Self { store, chunker }
    }

    /// Chunk a successfully scraped page and replace its stored chunk set.
    /// Returns the number of chunks written.
    ///
    /// Fails with `NotFound` if the page does not exist and with
    /// `InvalidPageState` if it is not in success status (the caller must
    /// re-scrape first; this is never retried internally).
    pub fn chunk_and_store(&self, page_id: i64) -> Result<usize> {
        let page = self
            .store
            .get_page(page_id)?
            .ok_or_else(|| Error::NotFound(format!("page {}", page_id)))?;

        let chunks = self.chunker.chunk_page(&page)?;
        let written = self.store.replace_chunks(page_id, &chunks)?;
        info!("Chunked page {} ({}): {} chunks written", page_id, page.url, written);
        Ok(written)
    }

    /// Like `chunk_and_store`, but skips the rewrite when the upsert
    /// reported unchanged content and a chunk set already exists. The
    /// chunker is deterministic, so the skipped rewrite would have produced
    /// an identical set.
    pub fn chunk_page_if_changed(&self, page_id: i64, content_changed: bool) -> Result<usize> {
        if !content_changed {
            let existing = self.store.get_chunks_for_page(page_id)?;
            if !existing.is_empty() {
                debug!("Page {} content unchanged, keeping {} chunks", page_id, existing.len());
                return Ok(existing.len());
            }
        }
        self.chunk_and_store(page_id)
    }
}
