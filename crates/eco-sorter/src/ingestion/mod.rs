//! Guide ingestion: parsing, chunking, region tagging and indexing

mod chunker;
mod indexer;
mod parser;
mod processor;
mod registry;

pub use chunker::TextChunker;
pub use indexer::{collect_guides, GuideIndexer, IngestOutcome};
pub use parser::{normalize_text, FileParser, PageContent, ParsedDocument};
pub use processor::IngestPipeline;
pub use registry::{DocumentRegistry, FileStatus};
