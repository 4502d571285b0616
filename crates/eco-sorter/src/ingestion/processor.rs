//! Ingestion pipeline: parse, tag and chunk

use crate::error::Result;
use crate::region::Region;
use crate::types::{Chunk, Document};

use super::chunker::TextChunker;
use super::parser::{FileParser, ParsedDocument};

/// Parses a guide and slices it into region-tagged chunks
pub struct IngestPipeline {
    chunker: TextChunker,
}

impl IngestPipeline {
    /// Create a new ingestion pipeline
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunker: TextChunker::new(chunk_size, chunk_overlap),
        }
    }

    /// Parse a file
    pub fn parse_file(&self, filename: &str, data: &[u8]) -> Result<ParsedDocument> {
        FileParser::parse(filename, data)
    }

    /// Create chunks from a parsed document; each inherits the document's
    /// region and filename
    pub fn create_chunks(&self, doc: &Document, parsed: &ParsedDocument) -> Vec<Chunk> {
        self.chunker.chunk_document(doc, parsed)
    }

    /// Full ingestion: parse + tag + chunk
    pub fn ingest(
        &self,
        filename: &str,
        data: &[u8],
        region: Region,
    ) -> Result<(Document, Vec<Chunk>)> {
        let parsed = self.parse_file(filename, data)?;
        Ok(self.ingest_parsed(filename, data.len() as u64, region, &parsed))
    }

    /// Tag and chunk an already parsed document
    pub fn ingest_parsed(
        &self,
        filename: &str,
        file_size: u64,
        region: Region,
        parsed: &ParsedDocument,
    ) -> (Document, Vec<Chunk>) {
        let mut doc = Document::new(
            filename.to_string(),
            region,
            parsed.file_type,
            parsed.content_hash.clone(),
            file_size,
        );
        doc.total_pages = parsed.total_pages;

        let chunks = self.create_chunks(&doc, parsed);
        doc.total_chunks = chunks.len() as u32;

        tracing::debug!(
            "Chunked '{}' for {}: {} chars into {} chunks",
            filename,
            region,
            parsed.char_count(),
            chunks.len()
        );

        (doc, chunks)
    }
}

impl Default for IngestPipeline {
    fn default() -> Self {
        Self::new(1000, 200)
    }
}
