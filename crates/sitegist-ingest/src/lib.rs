//! Sitegist Ingest — page chunking and the chunk-and-store pipeline.

pub mod chunker;
pub mod ingest;

pub use chunker::{ChunkerConfig, PageChunker};
pub use ingest::Ingester;
