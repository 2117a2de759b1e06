//! Sitegist Store — SQLite pages + chunks with FTS5 full-text search.

pub mod schema;
pub mod sqlite;
pub mod types;

pub use sqlite::SqliteStore;
pub use types::*;
