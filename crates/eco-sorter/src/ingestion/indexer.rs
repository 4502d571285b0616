//! Embeds chunked guides and keeps the vector index and registry in step

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;
use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::providers::{EmbeddingProvider, VectorStoreProvider};
use crate::region::Region;
use crate::types::{Chunk, Document, FileType};

use super::processor::IngestPipeline;
use super::registry::{DocumentRegistry, FileStatus};

/// What happened to an ingested file
#[derive(Debug, Clone)]
pub enum IngestOutcome {
    /// New guide indexed
    Created(Document),
    /// Changed guide re-indexed; old chunks removed
    Replaced {
        document: Document,
        old_chunks_deleted: usize,
    },
    /// Identical content already indexed for this region
    Skipped { existing: Document, reason: String },
}

impl IngestOutcome {
    pub fn document(&self) -> &Document {
        match self {
            Self::Created(document) | Self::Replaced { document, .. } => document,
            Self::Skipped { existing, .. } => existing,
        }
    }

    /// Chunks written by this ingestion
    pub fn chunks_created(&self) -> u32 {
        match self {
            Self::Created(document) | Self::Replaced { document, .. } => document.total_chunks,
            Self::Skipped { .. } => 0,
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped { .. })
    }
}

/// Full ingestion: dedup, parse, chunk, embed, store, register
pub struct GuideIndexer {
    pipeline: IngestPipeline,
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStoreProvider>,
    registry: Arc<DocumentRegistry>,
    batch_size: usize,
    /// Held from the status check until the registry is updated
    ingest_lock: Mutex<()>,
}

impl GuideIndexer {
    pub fn new(
        pipeline: IngestPipeline,
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStoreProvider>,
        registry: Arc<DocumentRegistry>,
        batch_size: usize,
    ) -> Self {
        Self {
            pipeline,
            embedder,
            store,
            registry,
            batch_size: batch_size.max(1),
            ingest_lock: Mutex::new(()),
        }
    }

    /// Document registry
    pub fn registry(&self) -> &Arc<DocumentRegistry> {
        &self.registry
    }

    /// Ingest one guide for `region`
    pub async fn ingest(
        &self,
        filename: &str,
        data: &[u8],
        region: Region,
    ) -> Result<IngestOutcome> {
        if !FileType::from_filename(filename).is_supported() {
            return Err(Error::UnsupportedFileType(filename.to_string()));
        }

        let _guard = self.ingest_lock.lock().await;

        let content_hash = super::parser::hash_bytes(data);
        let previous = match self.registry.check_file_status(filename, region, &content_hash) {
            FileStatus::Unchanged(existing) => {
                tracing::info!("Skipped '{}' for {}: unchanged", filename, region);
                return Ok(IngestOutcome::Skipped {
                    existing,
                    reason: "unchanged".to_string(),
                });
            }
            FileStatus::Duplicate(existing) => {
                tracing::info!("Skipped '{}': duplicate of '{}'", filename, existing.filename);
                let reason = format!("duplicate of '{}'", existing.filename);
                return Ok(IngestOutcome::Skipped { existing, reason });
            }
            FileStatus::Modified(existing) => Some(existing),
            FileStatus::New => None,
        };

        let parsed = {
            let name = filename.to_string();
            let bytes = data.to_vec();
            tokio::task::spawn_blocking(move || super::parser::FileParser::parse(&name, &bytes))
                .await??
        };

        let (doc, mut chunks) =
            self.pipeline.ingest_parsed(filename, data.len() as u64, region, &parsed);

        if chunks.is_empty() {
            return Err(Error::file_parse(filename, "No chunks produced"));
        }

        self.embed_chunks(&mut chunks).await?;
        self.store.insert_chunks(&chunks).await?;

        let old_chunks_deleted = match self.commit(&doc, previous.as_ref()).await {
            Ok(deleted) => deleted,
            Err(e) => {
                self.rollback(&doc).await;
                return Err(e);
            }
        };

        let outcome = match previous {
            Some(_) => {
                tracing::info!(
                    "Replaced '{}' for {} (deleted {} old chunks, created {})",
                    filename,
                    region,
                    old_chunks_deleted,
                    doc.total_chunks
                );
                IngestOutcome::Replaced {
                    document: doc,
                    old_chunks_deleted,
                }
            }
            None => {
                tracing::info!(
                    "Ingested '{}' for {}: {} pages, {} chunks",
                    filename,
                    region,
                    doc.total_pages.unwrap_or(1),
                    doc.total_chunks
                );
                IngestOutcome::Created(doc)
            }
        };

        Ok(outcome)
    }

    /// Register `doc`, then drop the chunks of the version it replaces
    async fn commit(&self, doc: &Document, previous: Option<&Document>) -> Result<usize> {
        self.registry.insert(doc.clone())?;

        let Some(old) = previous else {
            return Ok(0);
        };

        let deleted = self.store.delete_by_document(&old.id).await?;
        if let Err(e) = self.registry.remove(&old.id) {
            tracing::warn!("Registry entry of replaced document {} kept: {}", old.id, e);
        }
        Ok(deleted)
    }

    /// Undo a partial ingestion so no chunk is left without a registry entry
    async fn rollback(&self, doc: &Document) {
        if let Err(e) = self.store.delete_by_document(&doc.id).await {
            tracing::warn!("Rollback of '{}' left chunks behind: {}", doc.filename, e);
        }
        if let Err(e) = self.registry.remove(&doc.id) {
            tracing::warn!("Rollback of '{}' left a registry entry: {}", doc.filename, e);
        }
    }

    /// Ingest a guide from disk; the file name becomes the chunk source
    pub async fn ingest_path(&self, path: &Path, region: Region) -> Result<IngestOutcome> {
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| Error::InvalidRequest(format!("Invalid file name: {}", path.display())))?
            .to_string();
        let data = tokio::fs::read(path).await?;
        self.ingest(&filename, &data, region).await
    }

    /// Remove a guide and its chunks
    pub async fn delete(&self, id: &Uuid) -> Result<usize> {
        let _guard = self.ingest_lock.lock().await;
        if self.registry.get(id).is_none() {
            return Err(Error::DocumentNotFound(id.to_string()));
        }
        let deleted = self.store.delete_by_document(id).await?;
        self.registry.remove(id)?;
        tracing::info!("Deleted document {} ({} chunks)", id, deleted);
        Ok(deleted)
    }

    async fn embed_chunks(&self, chunks: &mut [Chunk]) -> Result<()> {
        for batch in chunks.chunks_mut(self.batch_size) {
            let texts: Vec<String> = batch.iter().map(|c| c.content.clone()).collect();
            let embeddings = self.embedder.embed_batch(&texts).await?;

            if embeddings.len() != batch.len() {
                return Err(Error::embedding(format!(
                    "Expected {} embeddings, got {}",
                    batch.len(),
                    embeddings.len()
                )));
            }

            for (chunk, embedding) in batch.iter_mut().zip(embeddings) {
                chunk.embedding = embedding;
            }
        }
        Ok(())
    }
}

/// Supported guides under `path`: the file itself, or every supported file in
/// the directory tree, sorted by path
pub fn collect_guides(path: &Path) -> Vec<PathBuf> {
    if path.is_file() {
        return vec![path.to_path_buf()];
    }

    let mut files: Vec<PathBuf> = WalkDir::new(path)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .map(|n| FileType::from_filename(n).is_supported())
                .unwrap_or(false)
        })
        .collect();

    files.sort();
    files
}
