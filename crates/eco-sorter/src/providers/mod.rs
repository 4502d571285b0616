//! Provider abstractions for embeddings, LLM and vector storage
//!
//! Trait-based seams that allow switching between the local ONNX embedder
//! and Ollama, and between Mistral and a local Ollama model.

pub mod embedding;
pub mod llm;
pub mod local;
pub mod mistral;
pub mod ollama;
pub mod vector_store;

use std::sync::Arc;

use crate::config::{EcoConfig, EmbeddingBackend, LlmBackend};
use crate::error::Result;
use crate::generation::MistralClient;

pub use embedding::EmbeddingProvider;
pub use llm::{Generation, LlmProvider};
pub use local::{OnnxEmbeddingProvider, SqliteVectorStore};
pub use ollama::{OllamaEmbedder, OllamaLlm};
pub use vector_store::{VectorSearchResult, VectorStoreProvider};

/// Build the embedding provider selected in the configuration
pub async fn embedding_from_config(config: &EcoConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    match config.embeddings.backend {
        EmbeddingBackend::Onnx => {
            tracing::info!("Using ONNX embeddings ({})", config.embeddings.model);
            Ok(Arc::new(OnnxEmbeddingProvider::new(&config.embeddings).await?))
        }
        EmbeddingBackend::Ollama => {
            tracing::info!("Using Ollama embeddings ({})", config.ollama.embed_model);
            Ok(Arc::new(OllamaEmbedder::new(
                &config.ollama,
                &config.llm,
                config.embeddings.dimensions,
            )?))
        }
    }
}

/// Build the LLM provider selected in the configuration
pub fn llm_from_config(config: &EcoConfig) -> Result<Arc<dyn LlmProvider>> {
    match config.llm.backend {
        LlmBackend::Mistral => {
            tracing::info!("Using Mistral ({})", config.llm.model);
            Ok(Arc::new(MistralClient::new(&config.llm)?))
        }
        LlmBackend::Ollama => {
            tracing::info!("Using Ollama ({})", config.ollama.generate_model);
            Ok(Arc::new(OllamaLlm::new(&config.ollama, &config.llm)?))
        }
    }
}
