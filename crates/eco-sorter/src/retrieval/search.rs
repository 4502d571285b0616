//! Persistent vector store for region-tagged chunks
//!
//! Chunks and their embeddings live in a single SQLite file. Search is an
//! exact cosine scan over the chunks of one region.

use parking_lot::Mutex;
use rusqlite::{params, Connection};
use std::cmp::Ordering;
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::region::Region;
use crate::types::Chunk;

/// Search result with chunk and similarity
#[derive(Debug, Clone)]
pub struct SearchResult {
    /// The retrieved chunk
    pub chunk: Chunk,
    /// Cosine similarity (-1.0 to 1.0, higher is better)
    pub similarity: f32,
}

/// SQLite-backed chunk store
pub struct VectorStore {
    conn: Arc<Mutex<Connection>>,
}

impl VectorStore {
    /// Create or open the store at the given path
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)
            .map_err(|e| Error::vector_db(format!("Failed to open {}: {}", path.display(), e)))?;

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.migrate()?;

        tracing::info!(
            "Vector store opened at {:?} ({} chunks)",
            path,
            store.len()?
        );
        Ok(store)
    }

    /// Create an in-memory store
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.migrate()?;
        Ok(store)
    }

    fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute_batch(
            r#"
            PRAGMA journal_mode=WAL;
            PRAGMA synchronous=NORMAL;
            PRAGMA temp_store=MEMORY;
            "#,
        )?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS chunks (
                id TEXT PRIMARY KEY,
                document_id TEXT NOT NULL,
                region TEXT NOT NULL,
                source TEXT NOT NULL,
                page_number INTEGER,
                chunk_index INTEGER NOT NULL,
                char_start INTEGER NOT NULL,
                char_end INTEGER NOT NULL,
                content TEXT NOT NULL,
                dimensions INTEGER NOT NULL,
                embedding BLOB NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_chunks_region ON chunks(region);
            CREATE INDEX IF NOT EXISTS idx_chunks_document_id ON chunks(document_id);
            "#,
        )?;

        Ok(())
    }

    /// Insert a single chunk
    pub fn insert_chunk(&self, chunk: &Chunk) -> Result<()> {
        self.insert_chunks(std::slice::from_ref(chunk))
    }

    /// Insert chunks in one transaction; every chunk must carry an embedding
    pub fn insert_chunks(&self, chunks: &[Chunk]) -> Result<()> {
        if chunks.is_empty() {
            return Ok(());
        }

        if let Some(missing) = chunks.iter().find(|c| c.embedding.is_empty()) {
            return Err(Error::vector_db(format!(
                "Chunk {} has no embedding",
                missing.id
            )));
        }

        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        {
            let mut stmt = tx.prepare(
                r#"
                INSERT OR REPLACE INTO chunks (
                    id, document_id, region, source, page_number, chunk_index,
                    char_start, char_end, content, dimensions, embedding
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                "#,
            )?;

            for chunk in chunks {
                stmt.execute(params![
                    chunk.id.to_string(),
                    chunk.document_id.to_string(),
                    chunk.region.tag(),
                    chunk.source,
                    chunk.page_number.map(|p| p as i64),
                    chunk.chunk_index as i64,
                    chunk.char_start as i64,
                    chunk.char_end as i64,
                    chunk.content,
                    chunk.embedding.len() as i64,
                    encode_embedding(&chunk.embedding),
                ])?;
            }
        }

        tx.commit()?;
        tracing::debug!("Inserted {} chunks", chunks.len());
        Ok(())
    }

    /// Top-k chunks of `region` by cosine similarity, best first
    pub fn search(&self, query: &[f32], top_k: usize, region: Region) -> Result<Vec<SearchResult>> {
        if top_k == 0 || query.is_empty() {
            return Ok(Vec::new());
        }

        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            r#"
            SELECT id, document_id, source, page_number, chunk_index,
                   char_start, char_end, content, embedding
            FROM chunks
            WHERE region = ?1 AND dimensions = ?2
            "#,
        )?;

        let rows = stmt.query_map(params![region.tag(), query.len() as i64], |row| {
            let id: String = row.get(0)?;
            let document_id: String = row.get(1)?;
            let page_number: Option<i64> = row.get(3)?;
            let chunk_index: i64 = row.get(4)?;
            let char_start: i64 = row.get(5)?;
            let char_end: i64 = row.get(6)?;
            let blob: Vec<u8> = row.get(8)?;

            Ok((
                Chunk {
                    id: Uuid::parse_str(&id).unwrap_or_default(),
                    document_id: Uuid::parse_str(&document_id).unwrap_or_default(),
                    region,
                    source: row.get(2)?,
                    page_number: page_number.map(|p| p as u32),
                    chunk_index: chunk_index as u32,
                    char_start: char_start as usize,
                    char_end: char_end as usize,
                    content: row.get(7)?,
                    embedding: Vec::new(),
                },
                blob,
            ))
        })?;

        let mut results = Vec::new();
        for row in rows {
            match row {
                Ok((chunk, blob)) => {
                    let embedding = decode_embedding(&blob);
                    if embedding.len() != query.len() {
                        continue;
                    }
                    results.push(SearchResult {
                        similarity: cosine_similarity(query, &embedding),
                        chunk,
                    });
                }
                Err(e) => tracing::warn!("Error reading chunk row: {}", e),
            }
        }

        results.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(Ordering::Equal)
        });
        results.truncate(top_k);

        Ok(results)
    }

    /// Delete all chunks for a document
    pub fn delete_by_document(&self, document_id: &Uuid) -> Result<usize> {
        let conn = self.conn.lock();
        let deleted = conn.execute(
            "DELETE FROM chunks WHERE document_id = ?1",
            params![document_id.to_string()],
        )?;
        Ok(deleted)
    }

    /// Total number of chunks stored
    pub fn len(&self) -> Result<usize> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM chunks", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Check if the store is empty
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Number of chunks tagged with `region`
    pub fn count_by_region(&self, region: Region) -> Result<usize> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM chunks WHERE region = ?1",
            params![region.tag()],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}

/// Little-endian f32 blob
fn encode_embedding(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn decode_embedding(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}

/// Cosine similarity; zero vectors score 0
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}
