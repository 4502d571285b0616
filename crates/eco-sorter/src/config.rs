//! Configuration for the sorting assistant

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct EcoConfig {
    /// Server configuration
    pub server: ServerConfig,
    /// Embedding configuration
    pub embeddings: EmbeddingConfig,
    /// Chunking configuration
    pub chunking: ChunkingConfig,
    /// Retrieval configuration
    pub retrieval: RetrievalConfig,
    /// Hosted LLM configuration
    pub llm: LlmConfig,
    /// Local Ollama configuration (alternative backend)
    pub ollama: OllamaConfig,
    /// Vector database configuration
    pub vector_db: VectorDbConfig,
    /// Where the source guides live
    pub documents: DocumentsConfig,
    /// Waste detector configuration
    pub vision: VisionConfig,
    /// Carbon footprint estimate
    pub footprint: FootprintConfig,
}

impl EcoConfig {
    /// Load configuration from an optional TOML file, then apply `.env` and
    /// environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        // A missing .env is normal outside development
        let _ = dotenvy::dotenv();

        let mut config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path).map_err(|e| {
                    Error::Config(format!("Failed to read {}: {}", path.display(), e))
                })?;
                toml::from_str::<EcoConfig>(&raw).map_err(|e| {
                    Error::Config(format!("Invalid config {}: {}", path.display(), e))
                })?
            }
            None => EcoConfig::default(),
        };

        config.apply_env();
        Ok(config)
    }

    /// Apply environment variable overrides
    pub fn apply_env(&mut self) {
        if let Ok(key) = std::env::var("MISTRAL_API_KEY") {
            if !key.trim().is_empty() {
                self.llm.api_key = Some(key.trim().to_string());
            }
        }
        if let Ok(host) = std::env::var("ECO_SORTER_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("ECO_SORTER_PORT") {
            match port.parse() {
                Ok(port) => self.server.port = port,
                Err(_) => tracing::warn!("Ignoring invalid ECO_SORTER_PORT: {}", port),
            }
        }
        if let Ok(model) = std::env::var("ECO_SORTER_MODEL") {
            self.llm.model = model;
        }
    }

    /// Check invariants that would otherwise surface as confusing runtime errors
    pub fn validate(&self) -> Result<()> {
        if self.chunking.chunk_size == 0 {
            return Err(Error::Config("chunk_size must be positive".to_string()));
        }
        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            return Err(Error::Config(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunking.chunk_overlap, self.chunking.chunk_size
            )));
        }
        if self.retrieval.top_k == 0 {
            return Err(Error::Config("retrieval.top_k must be positive".to_string()));
        }
        if self.llm.backend == LlmBackend::Mistral && self.llm.api_key.is_none() {
            return Err(Error::Config(
                "MISTRAL_API_KEY is not set. Create a .env file at the project root or export it."
                    .to_string(),
            ));
        }
        Ok(())
    }

    /// Directory holding the vector index and the document registry
    pub fn storage_dir(&self) -> PathBuf {
        self.vector_db
            .storage_path
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host address
    pub host: String,
    /// Port number
    pub port: u16,
    /// Enable CORS
    pub enable_cors: bool,
    /// Maximum upload size in bytes (default: 50MB)
    pub max_upload_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8501,
            enable_cors: true,
            max_upload_size: 50 * 1024 * 1024,
        }
    }
}

/// Embedding backend selection
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    /// Local sentence-transformers model through ONNX Runtime
    #[default]
    Onnx,
    /// Ollama embedding endpoint
    Ollama,
}

/// Embedding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Which embedder to use
    pub backend: EmbeddingBackend,
    /// Model to use (default: all-MiniLM-L6-v2)
    pub model: String,
    /// Embedding dimensions (384 for MiniLM, 768 for nomic-embed-text)
    pub dimensions: usize,
    /// Batch size for embedding generation
    pub batch_size: usize,
    /// Maximum sequence length
    pub max_length: usize,
    /// Cache directory for models
    pub cache_dir: PathBuf,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            backend: EmbeddingBackend::Onnx,
            model: "all-MiniLM-L6-v2".to_string(),
            dimensions: 384,
            batch_size: 32,
            max_length: 256,
            cache_dir: dirs::cache_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("eco-sorter")
                .join("models"),
        }
    }
}

/// Text chunking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Target chunk size in characters
    pub chunk_size: usize,
    /// Overlap between chunks in characters
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

/// Retrieval configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Number of passages handed to the LLM
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { top_k: 4 }
    }
}

/// LLM backend selection
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LlmBackend {
    /// Mistral hosted API
    #[default]
    Mistral,
    /// Local Ollama server
    Ollama,
}

/// Hosted LLM configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Which generator to use
    pub backend: LlmBackend,
    /// API base URL
    pub base_url: String,
    /// Generation model name
    pub model: String,
    /// Temperature for generation (low = factual)
    pub temperature: f32,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Number of retries for failed requests
    pub max_retries: u32,
    /// API key, read from MISTRAL_API_KEY
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            backend: LlmBackend::Mistral,
            base_url: "https://api.mistral.ai".to_string(),
            model: "mistral-small-latest".to_string(),
            temperature: 0.1,
            timeout_secs: 60,
            max_retries: 2,
            api_key: None,
        }
    }
}

/// Ollama configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OllamaConfig {
    /// Ollama base URL
    pub base_url: String,
    /// Embedding model name
    pub embed_model: String,
    /// Generation model name
    pub generate_model: String,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            embed_model: "nomic-embed-text".to_string(),
            generate_model: "phi3".to_string(),
        }
    }
}

/// Vector database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorDbConfig {
    /// SQLite file holding chunks and embeddings
    pub storage_path: PathBuf,
}

impl Default for VectorDbConfig {
    fn default() -> Self {
        Self {
            storage_path: PathBuf::from("./data/vectorstore/chunks.db"),
        }
    }
}

/// Source guide location
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentsConfig {
    /// Directory the CLI resolves bare guide filenames against
    pub documents_dir: PathBuf,
}

impl Default for DocumentsConfig {
    fn default() -> Self {
        Self {
            documents_dir: PathBuf::from("./data/documents"),
        }
    }
}

/// Waste detector configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VisionConfig {
    /// Exported ONNX detector weights
    pub model_path: PathBuf,
    /// Square input resolution the detector was exported with
    pub input_size: u32,
    /// Minimum detection confidence (0-1)
    pub conf_threshold: f32,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("./models_training_runs/eco_sorter_v5/weights/best.onnx"),
            input_size: 640,
            conf_threshold: 0.5,
        }
    }
}

/// Carbon footprint estimate shown next to each answer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FootprintConfig {
    /// Grams of CO2 attributed to each processed token
    pub co2_grams_per_token: f64,
}

impl Default for FootprintConfig {
    fn default() -> Self {
        Self {
            co2_grams_per_token: 0.0004,
        }
    }
}
