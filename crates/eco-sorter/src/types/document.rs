//! Guide documents and region-tagged chunks

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::region::Region;

/// Supported guide formats
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    /// PDF sorting guide
    Pdf,
    /// Plain text file
    Txt,
    /// Markdown file
    Markdown,
    /// Unknown file type
    Unknown,
}

impl FileType {
    /// Detect file type from extension
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "pdf" => Self::Pdf,
            "txt" | "text" => Self::Txt,
            "md" | "markdown" => Self::Markdown,
            _ => Self::Unknown,
        }
    }

    /// Detect file type from a filename
    pub fn from_filename(filename: &str) -> Self {
        match filename.rsplit_once('.') {
            Some((_, ext)) => Self::from_extension(ext),
            None => Self::Unknown,
        }
    }

    /// Check if this is a supported file type
    pub fn is_supported(&self) -> bool {
        !matches!(self, Self::Unknown)
    }
}

/// A sorting guide that has been ingested for one region
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Unique document ID
    pub id: Uuid,
    /// Original filename, also used as the chunk `source`
    pub filename: String,
    /// Region whose rules this guide describes
    pub region: Region,
    /// File type
    pub file_type: FileType,
    /// Content hash for deduplication
    pub content_hash: String,
    /// Total number of pages
    pub total_pages: Option<u32>,
    /// Total number of chunks created
    pub total_chunks: u32,
    /// File size in bytes
    pub file_size: u64,
    /// Ingestion timestamp
    pub ingested_at: chrono::DateTime<chrono::Utc>,
}

impl Document {
    /// Create a new document record
    pub fn new(
        filename: String,
        region: Region,
        file_type: FileType,
        content_hash: String,
        file_size: u64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            filename,
            region,
            file_type,
            content_hash,
            total_pages: None,
            total_chunks: 0,
            file_size,
            ingested_at: chrono::Utc::now(),
        }
    }
}

/// A slice of a guide, the unit of retrieval
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    /// Unique chunk ID
    pub id: Uuid,
    /// Parent document ID
    pub document_id: Uuid,
    /// Region tag copied from the document at ingestion time
    pub region: Region,
    /// Source filename
    pub source: String,
    /// Page number (1-indexed)
    pub page_number: Option<u32>,
    /// Chunk index within document
    pub chunk_index: u32,
    /// Character position in the page
    pub char_start: usize,
    pub char_end: usize,
    /// Text content
    pub content: String,
    /// Embedding vector
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub embedding: Vec<f32>,
}

impl Chunk {
    /// Create a new chunk inheriting region and source from its document
    pub fn new(
        doc: &Document,
        content: String,
        page_number: Option<u32>,
        char_start: usize,
        char_end: usize,
        chunk_index: u32,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            document_id: doc.id,
            region: doc.region,
            source: doc.filename.clone(),
            page_number,
            chunk_index,
            char_start,
            char_end,
            content,
            embedding: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_type_from_filename() {
        assert_eq!(FileType::from_filename("guide_bruxelles.PDF"), FileType::Pdf);
        assert_eq!(FileType::from_filename("notes.md"), FileType::Markdown);
        assert_eq!(FileType::from_filename("README"), FileType::Unknown);
        assert!(!FileType::from_filename("photo.jpg").is_supported());
    }

    #[test]
    fn test_chunk_inherits_document_tags() {
        let doc = Document::new(
            "guide_namur.pdf".to_string(),
            Region::Namur,
            FileType::Pdf,
            "abc".to_string(),
            10,
        );
        let chunk = Chunk::new(&doc, "Sac bleu : PMC".to_string(), Some(3), 0, 14, 0);
        assert_eq!(chunk.region, Region::Namur);
        assert_eq!(chunk.source, "guide_namur.pdf");
        assert_eq!(chunk.document_id, doc.id);
        assert_eq!(chunk.page_number, Some(3));
    }
}
