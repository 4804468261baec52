//! Retrieval backends behind the two search channels.

pub mod fulltext;
pub mod sources;
pub mod types;
pub mod vector;

use async_trait::async_trait;

use crate::core::errors::ApiError;

pub use fulltext::{IndexedChunk, SqliteFtsStore};
pub use sources::SourceLinker;
pub use types::{Channel, DedupKey, FullTextQuery, SearchResult, SourceEntry, VectorQuery};
pub use vector::WeaviateClient;

/// Hybrid (semantic + lexical) store addressed by collection name.
#[async_trait]
pub trait VectorSearch: Send + Sync {
    /// Fails with `NotFound` when the collection is missing.
    async fn ensure_collection(&self, collection: &str) -> Result<(), ApiError>;

    async fn query(&self, collection: &str, query: &VectorQuery) -> Result<Vec<SearchResult>, ApiError>;
}

/// Lexical store over the same corpus.
#[async_trait]
pub trait FullTextSearch: Send + Sync {
    /// Fails with `NotFound` when the index is missing.
    async fn ensure_index(&self) -> Result<(), ApiError>;

    async fn query(&self, query: &FullTextQuery) -> Result<Vec<SearchResult>, ApiError>;

    async fn list_sources(&self) -> Result<Vec<SourceEntry>, ApiError>;
}
