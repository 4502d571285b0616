//! Vector store provider trait for storing and searching embeddings

use async_trait::async_trait;
use uuid::Uuid;
use crate::error::Result;
use crate::region::Region;
use crate::types::Chunk;

pub use crate::retrieval::SearchResult as VectorSearchResult;

/// Trait for vector storage and region-restricted similarity search
///
/// Implementations:
/// - `SqliteVectorStore`: on-disk SQLite index with exact cosine scan
#[async_trait]
pub trait VectorStoreProvider: Send + Sync {
    /// Insert multiple chunks (batch)
    async fn insert_chunks(&self, chunks: &[Chunk]) -> Result<()>;

    /// Search the chunks of `region` for the `top_k` closest to the query
    async fn search(
        &self,
        query_embedding: &[f32],
        top_k: usize,
        region: Region,
    ) -> Result<Vec<VectorSearchResult>>;

    /// Delete all chunks for a document
    async fn delete_by_document(&self, document_id: &Uuid) -> Result<usize>;

    /// Get total number of chunks stored
    async fn len(&self) -> Result<usize>;

    /// Check if store is empty
    async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }

    /// Number of chunks tagged with `region`
    async fn count_by_region(&self, region: Region) -> Result<usize>;

    /// Check if the provider is healthy
    async fn health_check(&self) -> Result<bool>;

    /// Get provider name for logging
    fn name(&self) -> &str;
}
