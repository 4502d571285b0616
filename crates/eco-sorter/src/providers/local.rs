//! Local provider implementations
//!
//! These wrap the synchronous SQLite store and ONNX embedder, moving their
//! work onto the blocking thread pool.

use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

use crate::config::EmbeddingConfig;
use crate::embeddings::OnnxEmbedder;
use crate::error::Result;
use crate::region::Region;
use crate::retrieval::VectorStore;
use crate::types::Chunk;

use super::embedding::EmbeddingProvider;
use super::vector_store::{VectorSearchResult, VectorStoreProvider};

/// Vector store provider backed by the SQLite chunk index
pub struct SqliteVectorStore {
    store: Arc<VectorStore>,
}

impl SqliteVectorStore {
    /// Create from existing VectorStore
    pub fn new(store: Arc<VectorStore>) -> Self {
        Self { store }
    }

    /// Open the index at the configured path
    pub fn open(path: &std::path::Path) -> Result<Self> {
        Ok(Self::new(Arc::new(VectorStore::new(path)?)))
    }

    /// Get underlying store for direct access
    pub fn inner(&self) -> &Arc<VectorStore> {
        &self.store
    }
}

#[async_trait]
impl VectorStoreProvider for SqliteVectorStore {
    async fn insert_chunks(&self, chunks: &[Chunk]) -> Result<()> {
        let store = self.store.clone();
        let chunks = chunks.to_vec();
        tokio::task::spawn_blocking(move || store.insert_chunks(&chunks)).await?
    }

    async fn search(
        &self,
        query_embedding: &[f32],
        top_k: usize,
        region: Region,
    ) -> Result<Vec<VectorSearchResult>> {
        let store = self.store.clone();
        let query = query_embedding.to_vec();
        tokio::task::spawn_blocking(move || store.search(&query, top_k, region)).await?
    }

    async fn delete_by_document(&self, document_id: &Uuid) -> Result<usize> {
        let store = self.store.clone();
        let doc_id = *document_id;
        tokio::task::spawn_blocking(move || store.delete_by_document(&doc_id)).await?
    }

    async fn len(&self) -> Result<usize> {
        let store = self.store.clone();
        tokio::task::spawn_blocking(move || store.len()).await?
    }

    async fn count_by_region(&self, region: Region) -> Result<usize> {
        let store = self.store.clone();
        tokio::task::spawn_blocking(move || store.count_by_region(region)).await?
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(self.len().await.is_ok())
    }

    fn name(&self) -> &str {
        "sqlite"
    }
}

/// Embedding provider running the ONNX sentence-transformers model in-process
pub struct OnnxEmbeddingProvider {
    embedder: Arc<OnnxEmbedder>,
}

impl OnnxEmbeddingProvider {
    /// Load (and download if needed) the configured model
    pub async fn new(config: &EmbeddingConfig) -> Result<Self> {
        Ok(Self {
            embedder: Arc::new(OnnxEmbedder::new(config).await?),
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OnnxEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let embedder = self.embedder.clone();
        let text = text.to_string();
        tokio::task::spawn_blocking(move || embedder.embed_one(&text)).await?
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let embedder = self.embedder.clone();
        let texts = texts.to_vec();
        tokio::task::spawn_blocking(move || {
            let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
            embedder.embed_batch(&refs)
        })
        .await?
    }

    fn dimensions(&self) -> usize {
        self.embedder.dimensions()
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "onnx"
    }
}
