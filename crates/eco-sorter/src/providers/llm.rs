//! LLM provider trait for generating answers

use async_trait::async_trait;
use crate::error::Result;
use crate::types::LlmUsage;

/// Generated text with the token counters reported by the backend
#[derive(Debug, Clone, Default)]
pub struct Generation {
    pub text: String,
    pub usage: LlmUsage,
}

/// Trait for LLM-based answer generation
///
/// Implementations:
/// - `MistralClient`: Mistral hosted chat completions (mistral-small-latest)
/// - `OllamaLlm`: local Ollama server (phi3, llama3, etc.)
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Complete a fully assembled prompt
    async fn generate(&self, prompt: &str) -> Result<Generation>;

    /// Check if the provider is healthy and available
    async fn health_check(&self) -> Result<bool>;

    /// Get provider name for logging
    fn name(&self) -> &str;

    /// Get the model being used
    fn model(&self) -> &str;
}
