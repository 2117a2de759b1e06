//! Sitegist Retrieve — query-time ranking and context assembly.

pub mod context;
pub mod retriever;
pub mod types;

pub use context::{AssembledContext, ContextAssembler, ContextConfig};
pub use retriever::Retriever;
pub use types::{RankedChunk, RetrieverConfig};
