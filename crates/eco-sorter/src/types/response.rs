//! Request and response types for the assistant

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::document::{Document, FileType};
use crate::region::Region;
use crate::vision::{Prediction, WasteCategory};

/// Token counters reported by the language model
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LlmUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub total_tokens: u32,
}

impl LlmUsage {
    /// Build from input/output counts; total is their sum
    pub fn new(input_tokens: u32, output_tokens: u32) -> Self {
        Self {
            input_tokens,
            output_tokens,
            total_tokens: input_tokens + output_tokens,
        }
    }
}

/// Usage counters plus the derived carbon estimate
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub total_tokens: u32,
    /// Estimated grams of CO2 for this answer
    pub co2_grams: f64,
}

impl Metrics {
    pub fn from_usage(usage: LlmUsage, co2_grams_per_token: f64) -> Self {
        Self {
            input_tokens: usage.input_tokens,
            output_tokens: usage.output_tokens,
            total_tokens: usage.total_tokens,
            co2_grams: usage.total_tokens as f64 * co2_grams_per_token,
        }
    }

    /// All-zero metrics, used when no generation took place
    pub fn zero() -> Self {
        Self::default()
    }

    /// CO2 estimate as displayed next to answers, e.g. `0.1200 g`
    pub fn format_co2(&self) -> String {
        format!("{:.4} g", self.co2_grams)
    }
}

/// Question for the assistant
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AskRequest {
    /// The user's question
    pub question: String,
    /// Region whose rules apply
    #[serde(default)]
    pub region: Region,
}

/// Passage the answer was grounded on
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceRef {
    pub chunk_id: Uuid,
    pub filename: String,
    pub page_number: Option<u32>,
    /// Cosine similarity with the question (higher is closer)
    pub similarity: f32,
}

impl SourceRef {
    /// `guide.pdf, page 3`, or just the filename for unpaged guides
    pub fn format_source(&self) -> String {
        match self.page_number {
            Some(page) => format!("{}, page {}", self.filename, page),
            None => self.filename.clone(),
        }
    }
}

/// Answer returned to the user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AskResponse {
    /// Generated answer
    pub answer: String,
    /// Token counters and CO2 estimate
    pub metrics: Metrics,
    /// Passages handed to the model
    pub sources: Vec<SourceRef>,
    /// Region the answer applies to
    pub region: Region,
    /// Processing time in milliseconds
    pub processing_time_ms: u64,
}

/// Response from document ingestion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestResponse {
    /// Whether every file was ingested
    pub success: bool,
    /// Ingested (or already present) documents
    pub documents: Vec<DocumentSummary>,
    /// Total chunks created across all documents
    pub total_chunks_created: u32,
    /// Processing time in milliseconds
    pub processing_time_ms: u64,
    /// Any errors encountered (partial success)
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub errors: Vec<IngestError>,
}

/// Summary of an ingested document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentSummary {
    pub id: Uuid,
    pub filename: String,
    pub region: Region,
    pub file_type: FileType,
    pub total_pages: Option<u32>,
    pub total_chunks: u32,
    pub ingested_at: chrono::DateTime<chrono::Utc>,
    /// True when identical content was already indexed
    #[serde(default)]
    pub skipped: bool,
}

impl From<&Document> for DocumentSummary {
    fn from(doc: &Document) -> Self {
        Self {
            id: doc.id,
            filename: doc.filename.clone(),
            region: doc.region,
            file_type: doc.file_type,
            total_pages: doc.total_pages,
            total_chunks: doc.total_chunks,
            ingested_at: doc.ingested_at,
            skipped: false,
        }
    }
}

/// Per-file ingestion failure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestError {
    pub filename: String,
    pub error: String,
}

/// Document listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentListResponse {
    pub documents: Vec<DocumentSummary>,
    pub total_count: usize,
}

/// Result of classifying a photo
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifyResponse {
    pub prediction: Prediction,
    /// Human-readable prediction, e.g. `carton (confiance: 87.00%)`
    pub description: String,
    /// Question to ask once the user confirms the prediction
    pub follow_up_question: String,
}

impl From<Prediction> for ClassifyResponse {
    fn from(prediction: Prediction) -> Self {
        Self {
            description: prediction.describe(),
            follow_up_question: prediction.follow_up_question().to_string(),
            prediction,
        }
    }
}

/// User confirmation of a predicted category
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmRequest {
    /// Confirmed category; `None` means nothing recognisable was detected
    pub category: Option<WasteCategory>,
    #[serde(default)]
    pub region: Region,
}
