//! Registry of ingested guides, persisted as `documents.json`

use dashmap::DashMap;
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::error::Result;
use crate::region::Region;
use crate::types::Document;

/// Status of an incoming file for deduplication
#[derive(Debug, Clone)]
pub enum FileStatus {
    /// File is new for this region, process it
    New,
    /// Same file and content already indexed for this region
    Unchanged(Document),
    /// Same content already indexed for this region under another name
    Duplicate(Document),
    /// Same filename and region but content changed: replace the old chunks
    Modified(Document),
}

/// Document registry backed by a JSON file
pub struct DocumentRegistry {
    documents: DashMap<Uuid, Document>,
    path: Option<PathBuf>,
}

impl DocumentRegistry {
    /// Load the registry stored at `path`, starting empty if it does not exist
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let documents = Self::load(&path);
        tracing::info!("Loaded {} documents from registry", documents.len());
        Self {
            documents,
            path: Some(path),
        }
    }

    /// Registry that is never written to disk
    pub fn in_memory() -> Self {
        Self {
            documents: DashMap::new(),
            path: None,
        }
    }

    fn load(path: &Path) -> DashMap<Uuid, Document> {
        let documents = DashMap::new();

        if path.exists() {
            match fs::read_to_string(path) {
                Ok(content) => match serde_json::from_str::<Vec<Document>>(&content) {
                    Ok(docs) => {
                        for doc in docs {
                            documents.insert(doc.id, doc);
                        }
                    }
                    Err(e) => {
                        tracing::warn!("Failed to parse {:?}: {}", path, e);
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to read {:?}: {}", path, e);
                }
            }
        }

        documents
    }

    fn save(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let content = serde_json::to_string_pretty(&self.list())?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, content)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Add or replace a document (persisted to disk)
    pub fn insert(&self, doc: Document) -> Result<()> {
        self.documents.insert(doc.id, doc);
        self.save()
    }

    /// Remove a document (persisted to disk)
    pub fn remove(&self, id: &Uuid) -> Result<Option<Document>> {
        let removed = self.documents.remove(id).map(|(_, d)| d);
        if removed.is_some() {
            self.save()?;
        }
        Ok(removed)
    }

    /// Get a document by ID
    pub fn get(&self, id: &Uuid) -> Option<Document> {
        self.documents.get(id).map(|d| d.clone())
    }

    /// All documents, oldest first
    pub fn list(&self) -> Vec<Document> {
        let mut docs: Vec<Document> = self
            .documents
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        docs.sort_by(|a, b| a.ingested_at.cmp(&b.ingested_at));
        docs
    }

    /// Number of registered documents
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    fn find(&self, predicate: impl Fn(&Document) -> bool) -> Option<Document> {
        self.documents
            .iter()
            .find(|entry| predicate(entry.value()))
            .map(|entry| entry.value().clone())
    }

    /// Decide what to do with an incoming file; deduplication is per region
    pub fn check_file_status(
        &self,
        filename: &str,
        region: Region,
        content_hash: &str,
    ) -> FileStatus {
        if let Some(existing) =
            self.find(|d| d.region == region && d.content_hash == content_hash)
        {
            return if existing.filename == filename {
                FileStatus::Unchanged(existing)
            } else {
                FileStatus::Duplicate(existing)
            };
        }

        if let Some(existing) = self.find(|d| d.region == region && d.filename == filename) {
            return FileStatus::Modified(existing);
        }

        FileStatus::New
    }
}
