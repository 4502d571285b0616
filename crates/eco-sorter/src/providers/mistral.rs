//! Mistral hosted LLM provider

use async_trait::async_trait;

use crate::error::Result;
use crate::generation::MistralClient;

use super::llm::{Generation, LlmProvider};

#[async_trait]
impl LlmProvider for MistralClient {
    async fn generate(&self, prompt: &str) -> Result<Generation> {
        let (text, usage) = self.complete(prompt).await?;
        Ok(Generation { text, usage })
    }

    async fn health_check(&self) -> Result<bool> {
        MistralClient::health_check(self).await
    }

    fn name(&self) -> &str {
        "mistral"
    }

    fn model(&self) -> &str {
        MistralClient::model(self)
    }
}
