//! SQLite-backed page and chunk store with FTS5 full-text search.
//!
//! Pages are upserted by URL; chunks are rewritten per page through a single
//! IMMEDIATE transaction so concurrent readers see either the fully-old or
//! fully-new chunk set, never a mix. Chunks are immutable once inserted.

use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::schema::{FTS_SCHEMA_SQL, FTS_TRIGGERS_SQL, SCHEMA_SQL};
use crate::types::*;
use sitegist_core::{Error, Result};

/// Bodies longer than this are truncated on upsert.
pub const MAX_BODY_LEN: usize = 100_000;
/// Queries longer than this return an empty result instead of erroring.
pub const MAX_QUERY_LEN: usize = 1_000;

/// SQLite store for pages and their searchable chunks.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    db_path: PathBuf,
}

impl SqliteStore {
    /// Open or create the SQLite store.
    ///
    /// `db_dir` is the directory (e.g., `data/pagedb/`). The file will be
    /// `db_dir/sitegist.db`.
    pub fn open(db_dir: impl AsRef<Path>) -> Result<Self> {
        let db_dir = db_dir.as_ref();
        std::fs::create_dir_all(db_dir)
            .map_err(|e| Error::StorageUnavailable(e.to_string()))?;
        let db_path = db_dir.join("sitegist.db");

        let conn = Self::create_connection(&db_path)?;
        Self::init_schema(&conn)?;

        let store = Self {
            conn: Mutex::new(conn),
            db_path,
        };

        let page_count = store.count_pages(None)?;
        let chunk_count = store.count_chunks(None)?;
        info!(
            "SqliteStore initialized: {} pages, {} chunks, path={}",
            page_count,
            chunk_count,
            store.db_path.display()
        );

        Ok(store)
    }

    fn create_connection(db_path: &Path) -> Result<Connection> {
        let conn = Connection::open(db_path)
            .map_err(|e| Error::StorageUnavailable(e.to_string()))?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;
             PRAGMA synchronous = NORMAL;",
        )
        .map_err(|e| Error::StorageUnavailable(e.to_string()))?;
        Ok(conn)
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        let full_schema = format!("{}\n{}\n{}", SCHEMA_SQL, FTS_SCHEMA_SQL, FTS_TRIGGERS_SQL);
        conn.execute_batch(&full_schema)
            .map_err(|e| Error::StorageUnavailable(format!("schema init failed: {}", e)))?;
        Ok(())
    }

    // ---------------------------------------------------------------
    // Page CRUD
    // ---------------------------------------------------------------

    /// Register a URL ahead of scraping. Returns the page id; an existing
    /// page for the URL is left untouched.
    pub fn create_pending_page(&self, url: &str) -> Result<i64> {
        let now = now_millis();
        let conn = self.conn.lock();
        conn.prepare_cached(
            "INSERT INTO pages (url, status, created_at) VALUES (?1, 'pending', ?2) \
             ON CONFLICT(url) DO NOTHING",
        )
        .map_err(|e| Error::StorageUnavailable(e.to_string()))?
        .execute(params![url, now])
        .map_err(|e| Error::StorageUnavailable(e.to_string()))?;

        let id: i64 = conn
            .prepare_cached("SELECT id FROM pages WHERE url = ?1")
            .map_err(|e| Error::StorageUnavailable(e.to_string()))?
            .query_row(params![url], |row| row.get(0))
            .map_err(|e| Error::StorageUnavailable(e.to_string()))?;
        Ok(id)
    }

    /// Insert or overwrite a successfully extracted page by URL.
    ///
    /// Oversized bodies are truncated. Reports whether the content hash
    /// changed relative to the previously stored page so callers can skip
    /// re-chunking an unchanged re-scrape.
    pub fn upsert_page(&self, page: &NewPage) -> Result<UpsertOutcome> {
        let body = truncate_body(&page.body);
        let hash = content_hash(&page.title, &page.headings, &body, &page.metadata);
        let now = now_millis();

        let conn = self.conn.lock();

        let previous: Option<Option<String>> = conn
            .prepare_cached("SELECT content_hash FROM pages WHERE url = ?1")
            .map_err(|e| Error::StorageUnavailable(e.to_string()))?
            .query_row(params![page.url], |row| row.get(0))
            .optional()
            .map_err(|e| Error::StorageUnavailable(e.to_string()))?;

        conn.prepare_cached(
            "INSERT INTO pages (url, title, headings, body, metadata, status, content_hash, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, 'success', ?6, ?7) \
             ON CONFLICT(url) DO UPDATE SET \
                 title = excluded.title, \
                 headings = excluded.headings, \
                 body = excluded.body, \
                 metadata = excluded.metadata, \
                 status = 'success', \
                 content_hash = excluded.content_hash, \
                 updated_at = ?7",
        )
        .map_err(|e| Error::StorageUnavailable(e.to_string()))?
        .execute(params![page.url, page.title, page.headings, body, page.metadata, hash, now])
        .map_err(|e| Error::StorageUnavailable(e.to_string()))?;

        let page_id: i64 = conn
            .prepare_cached("SELECT id FROM pages WHERE url = ?1")
            .map_err(|e| Error::StorageUnavailable(e.to_string()))?
            .query_row(params![page.url], |row| row.get(0))
            .map_err(|e| Error::StorageUnavailable(e.to_string()))?;

        let content_changed = match previous {
            Some(Some(prev_hash)) => prev_hash != hash,
            _ => true,
        };

        debug!(
            "Upserted page {} ({}), content_changed={}",
            page_id, page.url, content_changed
        );
        Ok(UpsertOutcome { page_id, content_changed })
    }

    /// Get a page by ID.
    pub fn get_page(&self, page_id: i64) -> Result<Option<Page>> {
        let conn = self.conn.lock();
        let row = conn
            .prepare_cached("SELECT * FROM pages WHERE id = ?1")
            .map_err(|e| Error::StorageUnavailable(e.to_string()))?
            .query_row(params![page_id], |row| Ok(Self::row_to_page(row)))
            .optional()
            .map_err(|e| Error::StorageUnavailable(e.to_string()))?;
        Ok(row)
    }

    /// Find a page by its canonical URL.
    pub fn find_page_by_url(&self, url: &str) -> Result<Option<Page>> {
        let conn = self.conn.lock();
        let row = conn
            .prepare_cached("SELECT * FROM pages WHERE url = ?1")
            .map_err(|e| Error::StorageUnavailable(e.to_string()))?
            .query_row(params![url], |row| Ok(Self::row_to_page(row)))
            .optional()
            .map_err(|e| Error::StorageUnavailable(e.to_string()))?;
        Ok(row)
    }

    /// Update the extraction status of a page.
    pub fn set_page_status(&self, page_id: i64, status: PageStatus) -> Result<bool> {
        let now = now_millis();
        let conn = self.conn.lock();
        let count = conn
            .execute(
                "UPDATE pages SET status = ?1, updated_at = ?2 WHERE id = ?3",
                params![status.as_str(), now, page_id],
            )
            .map_err(|e| Error::StorageUnavailable(e.to_string()))?;
        Ok(count > 0)
    }

    /// Delete a page and, by cascade, all its chunks.
    pub fn delete_page(&self, page_id: i64) -> Result<bool> {
        let conn = self.conn.lock();
        let count = conn
            .execute("DELETE FROM pages WHERE id = ?1", params![page_id])
            .map_err(|e| Error::StorageUnavailable(e.to_string()))?;
        Ok(count > 0)
    }

    /// Count pages, optionally filtered by status.
    pub fn count_pages(&self, status: Option<PageStatus>) -> Result<i64> {
        let conn = self.conn.lock();
        let count: i64 = match status {
            Some(s) => conn
                .query_row(
                    "SELECT COUNT(*) FROM pages WHERE status = ?1",
                    params![s.as_str()],
                    |row| row.get(0),
                )
                .map_err(|e| Error::StorageUnavailable(e.to_string()))?,
            None => conn
                .query_row("SELECT COUNT(*) FROM pages", [], |row| row.get(0))
                .map_err(|e| Error::StorageUnavailable(e.to_string()))?,
        };
        Ok(count)
    }

    /// Get pages with pagination. Returns (pages, total_count).
    pub fn get_pages_paginated(
        &self,
        page: usize,
        page_size: usize,
        ascending: bool,
    ) -> Result<(Vec<Page>, i64)> {
        let total = self.count_pages(None)?;
        let order = if ascending { "ASC" } else { "DESC" };
        let offset = (page.saturating_sub(1)) * page_size;

        let conn = self.conn.lock();
        let sql = format!(
            "SELECT * FROM pages ORDER BY created_at {} LIMIT ?1 OFFSET ?2",
            order
        );
        let mut stmt = conn
            .prepare_cached(&sql)
            .map_err(|e| Error::StorageUnavailable(e.to_string()))?;
        let rows = stmt
            .query_map(params![page_size as i64, offset as i64], |row| {
                Ok(Self::row_to_page(row))
            })
            .map_err(|e| Error::StorageUnavailable(e.to_string()))?;

        let pages: Vec<Page> = rows.filter_map(|r| r.ok()).collect();
        Ok((pages, total))
    }

    // ---------------------------------------------------------------
    // Chunk operations
    // ---------------------------------------------------------------

    /// Atomically delete all existing chunks for `page_id` and insert the
    /// new set. All-or-nothing: a failure partway through rolls back, so
    /// concurrent readers never observe a mixed old/new set.
    pub fn replace_chunks(&self, page_id: i64, chunks: &[NewChunk]) -> Result<usize> {
        validate_chunk_set(chunks)?;

        let page = self
            .get_page(page_id)?
            .ok_or_else(|| Error::NotFound(format!("page {}", page_id)))?;
        if page.status != PageStatus::Success {
            return Err(Error::InvalidPageState {
                page_id,
                reason: format!("has status {}, expected success", page.status.as_str()),
            });
        }

        let now = now_millis();
        let mut conn = self.conn.lock();
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| Error::StorageUnavailable(e.to_string()))?;

        tx.execute("DELETE FROM chunks WHERE page_id = ?1", params![page_id])
            .map_err(|e| Error::StorageUnavailable(e.to_string()))?;

        {
            let mut stmt = tx
                .prepare_cached(
                    "INSERT INTO chunks (page_id, chunk_text, chunk_type, priority, chunk_order, created_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                )
                .map_err(|e| Error::StorageUnavailable(e.to_string()))?;
            for chunk in chunks {
                stmt.execute(params![
                    page_id,
                    chunk.text,
                    chunk.chunk_type.as_str(),
                    chunk.priority,
                    chunk.chunk_order,
                    now,
                ])
                .map_err(|e| Error::StorageUnavailable(e.to_string()))?;
            }
        }

        tx.commit()
            .map_err(|e| Error::StorageUnavailable(e.to_string()))?;

        debug!("Replaced chunks for page {}: {} written", page_id, chunks.len());
        Ok(chunks.len())
    }

    /// Get all chunks for a page in reading order.
    pub fn get_chunks_for_page(&self, page_id: i64) -> Result<Vec<Chunk>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare_cached("SELECT * FROM chunks WHERE page_id = ?1 ORDER BY chunk_order")
            .map_err(|e| Error::StorageUnavailable(e.to_string()))?;
        let rows = stmt
            .query_map(params![page_id], |row| Ok(Self::row_to_chunk(row)))
            .map_err(|e| Error::StorageUnavailable(e.to_string()))?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    /// Count chunks, optionally filtered by type.
    pub fn count_chunks(&self, chunk_type: Option<ChunkType>) -> Result<i64> {
        let conn = self.conn.lock();
        let count: i64 = match chunk_type {
            Some(t) => conn
                .query_row(
                    "SELECT COUNT(*) FROM chunks WHERE chunk_type = ?1",
                    params![t.as_str()],
                    |row| row.get(0),
                )
                .map_err(|e| Error::StorageUnavailable(e.to_string()))?,
            None => conn
                .query_row("SELECT COUNT(*) FROM chunks", [], |row| row.get(0))
                .map_err(|e| Error::StorageUnavailable(e.to_string()))?,
        };
        Ok(count)
    }

    // ---------------------------------------------------------------
    // Full-text search (FTS5)
    // ---------------------------------------------------------------

    /// Full-text search over chunk text using FTS5 BM25 ranking, restricted
    /// to chunks of successfully extracted pages.
    ///
    /// Empty and over-length queries return an empty result rather than
    /// erroring.
    pub fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>> {
        if query.chars().count() > MAX_QUERY_LEN {
            return Ok(Vec::new());
        }
        let fts_query = Self::sanitize_fts_query(query);
        if fts_query.is_empty() {
            return Ok(Vec::new());
        }

        let conn = self.conn.lock();
        let sql = "SELECT c.id, c.page_id, p.url, c.chunk_text, c.chunk_type, \
                          c.priority, c.chunk_order, chunks_fts.rank AS bm25_score \
                   FROM chunks_fts \
                   JOIN chunks c ON c.id = chunks_fts.rowid \
                   JOIN pages p ON p.id = c.page_id \
                   WHERE chunks_fts MATCH ?1 \
                     AND p.status = 'success' \
                   ORDER BY chunks_fts.rank \
                   LIMIT ?2";

        let mut stmt = conn
            .prepare_cached(sql)
            .map_err(|e| Error::StorageUnavailable(e.to_string()))?;
        let rows = stmt
            .query_map(params![fts_query, limit as i64], |row| {
                let bm25_score: f64 = row.get("bm25_score").unwrap_or(0.0);
                let chunk_type: String = row.get("chunk_type")?;
                Ok(SearchHit {
                    chunk_id: row.get("id")?,
                    page_id: row.get("page_id")?,
                    url: row.get("url")?,
                    text: row.get("chunk_text")?,
                    chunk_type: ChunkType::parse(&chunk_type).unwrap_or(ChunkType::Content),
                    priority: row.get("priority")?,
                    chunk_order: row.get("chunk_order")?,
                    score: -bm25_score, // FTS5 rank is negative; negate for positive
                })
            })
            .map_err(|e| Error::StorageUnavailable(e.to_string()))?;

        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    /// Sanitize a user query for FTS5 MATCH syntax.
    /// Wraps each token in double quotes and joins with OR.
    fn sanitize_fts_query(query: &str) -> String {
        let tokens: Vec<String> = query
            .split_whitespace()
            .map(|t| t.replace('"', ""))
            .filter(|t| !t.is_empty())
            .map(|t| format!("\"{}\"", t))
            .collect();
        if tokens.is_empty() {
            return String::new();
        }
        tokens.join(" OR ")
    }

    // ---------------------------------------------------------------
    // Stats
    // ---------------------------------------------------------------

    /// Get store statistics.
    pub fn stats(&self) -> Result<StoreStats> {
        let total_pages = self.count_pages(None)?;
        let success_pages = self.count_pages(Some(PageStatus::Success))?;
        let failed_pages = self.count_pages(Some(PageStatus::Failed))?;
        let total_chunks = self.count_chunks(None)?;
        let title_chunks = self.count_chunks(Some(ChunkType::Title))?;
        let heading_chunks = self.count_chunks(Some(ChunkType::Heading))?;
        let content_chunks = self.count_chunks(Some(ChunkType::Content))?;

        let db_size = std::fs::metadata(&self.db_path)
            .map(|m| m.len())
            .unwrap_or(0);

        Ok(StoreStats {
            total_pages,
            success_pages,
            failed_pages,
            total_chunks,
            title_chunks,
            heading_chunks,
            content_chunks,
            db_path: self.db_path.to_string_lossy().to_string(),
            db_size_mb: db_size as f64 / (1024.0 * 1024.0),
        })
    }

    // ---------------------------------------------------------------
    // Row mapping helpers
    // ---------------------------------------------------------------

    fn row_to_page(row: &rusqlite::Row<'_>) -> Page {
        let status: String = row.get("status").unwrap_or_default();
        Page {
            id: row.get("id").unwrap_or(0),
            url: row.get("url").unwrap_or_default(),
            title: row.get("title").unwrap_or_default(),
            headings: row.get("headings").unwrap_or_default(),
            body: row.get("body").unwrap_or_default(),
            metadata: row.get("metadata").unwrap_or_default(),
            status: PageStatus::parse(&status).unwrap_or(PageStatus::Pending),
            content_hash: row.get("content_hash").ok().flatten(),
            created_at: row.get("created_at").unwrap_or(0),
            updated_at: row.get("updated_at").ok().flatten(),
        }
    }

    fn row_to_chunk(row: &rusqlite::Row<'_>) -> Chunk {
        let chunk_type: String = row.get("chunk_type").unwrap_or_default();
        Chunk {
            id: row.get("id").unwrap_or(0),
            page_id: row.get("page_id").unwrap_or(0),
            text: row.get("chunk_text").unwrap_or_default(),
            chunk_type: ChunkType::parse(&chunk_type).unwrap_or(ChunkType::Content),
            priority: row.get("priority").unwrap_or(5),
            chunk_order: row.get("chunk_order").unwrap_or(0),
            created_at: row.get("created_at").unwrap_or(0),
        }
    }
}

/// Reject chunk sets violating the non-empty-text or
/// strictly-increasing-order invariants before any row is touched.
fn validate_chunk_set(chunks: &[NewChunk]) -> Result<()> {
    let mut last_order: Option<i32> = None;
    for chunk in chunks {
        if chunk.text.trim().is_empty() {
            return Err(Error::InvalidChunk("empty chunk text".into()));
        }
        if let Some(prev) = last_order {
            if chunk.chunk_order <= prev {
                return Err(Error::InvalidChunk(format!(
                    "chunk_order {} not strictly increasing after {}",
                    chunk.chunk_order, prev
                )));
            }
        }
        last_order = Some(chunk.chunk_order);
    }
    Ok(())
}

/// Truncate oversized bodies, marking the cut.
fn truncate_body(body: &str) -> String {
    if body.chars().count() <= MAX_BODY_LEN {
        return body.to_string();
    }
    let mut truncated: String = body.chars().take(MAX_BODY_LEN).collect();
    truncated.push_str("... [truncated]");
    truncated
}

/// SHA-256 hash over the concatenated page text fields.
pub fn content_hash(title: &str, headings: &str, body: &str, metadata: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(title.as_bytes());
    hasher.update(b"\x1f");
    hasher.update(headings.as_bytes());
    hasher.update(b"\x1f");
    hasher.update(body.as_bytes());
    hasher.update(b"\x1f");
    hasher.update(metadata.as_bytes());
    hex::encode(hasher.finalize())
}

/// Current time in epoch milliseconds.
fn now_millis() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_millis() as i64
}
