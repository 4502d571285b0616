//! Core types for the assistant

pub mod document;
pub mod response;

pub use document::{Chunk, Document, FileType};
pub use response::{
    AskRequest, AskResponse, ClassifyResponse, ConfirmRequest, DocumentListResponse,
    DocumentSummary, IngestError, IngestResponse, LlmUsage, Metrics, SourceRef,
};
