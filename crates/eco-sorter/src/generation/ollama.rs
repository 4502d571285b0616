//! Ollama client for local embeddings and generation with retry logic

use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::{LlmConfig, OllamaConfig};
use crate::error::{Error, Result};
use crate::types::LlmUsage;

use super::retry::{AttemptError, RetryPolicy};

/// Ollama API client with automatic retry
pub struct OllamaClient {
    /// HTTP client
    client: Client,
    base_url: String,
    embed_model: String,
    generate_model: String,
    temperature: f32,
    retry: RetryPolicy,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
    #[serde(default)]
    prompt_eval_count: u32,
    #[serde(default)]
    eval_count: u32,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}

impl OllamaClient {
    /// Create a new Ollama client with retry support
    pub fn new(ollama: &OllamaConfig, llm: &LlmConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(llm.timeout_secs))
            .pool_max_idle_per_host(5)
            .build()
            .map_err(|e| Error::llm(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: ollama.base_url.trim_end_matches('/').to_string(),
            embed_model: ollama.embed_model.clone(),
            generate_model: ollama.generate_model.clone(),
            temperature: llm.temperature,
            retry: RetryPolicy::new(llm.max_retries),
        })
    }

    /// Generation model name
    pub fn generate_model(&self) -> &str {
        &self.generate_model
    }

    /// Check if Ollama is available
    pub async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/api/tags", self.base_url);

        match self.client.get(&url).send().await {
            Ok(response) => Ok(response.status().is_success()),
            Err(_) => Ok(false),
        }
    }

    /// Generate an embedding using Ollama with retry
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let url = format!("{}/api/embeddings", self.base_url);
        let request = EmbedRequest {
            model: &self.embed_model,
            prompt: text,
        };
        let (url, request) = (&url, &request);

        let response: EmbedResponse = self
            .retry
            .run(|| async move {
                let response = match self.client.post(url).json(request).send().await {
                    Ok(response) => response,
                    Err(e) => {
                        return Err(AttemptError::Transient(Error::embedding(format!(
                            "Embedding request failed: {}",
                            e
                        ))))
                    }
                };

                let status = response.status();
                if !status.is_success() {
                    return Err(AttemptError::from_status(
                        status,
                        Error::embedding(format!("Embedding failed: HTTP {}", status)),
                    ));
                }

                response.json::<EmbedResponse>().await.map_err(|e| {
                    AttemptError::Fatal(Error::embedding(format!(
                        "Failed to parse embedding response: {}",
                        e
                    )))
                })
            })
            .await?;

        Ok(response.embedding)
    }

    /// Complete a prompt, returning the text and token counters
    pub async fn generate(&self, prompt: &str) -> Result<(String, LlmUsage)> {
        let url = format!("{}/api/generate", self.base_url);
        let request = GenerateRequest {
            model: &self.generate_model,
            prompt,
            stream: false,
            options: GenerateOptions {
                temperature: self.temperature,
            },
        };
        let (url, request) = (&url, &request);

        tracing::info!("Generating answer with model: {}", self.generate_model);

        let response: GenerateResponse = self
            .retry
            .run(|| async move {
                let response = match self.client.post(url).json(request).send().await {
                    Ok(response) => response,
                    Err(e) => {
                        return Err(AttemptError::Transient(Error::llm(format!(
                            "Generation request failed: {}",
                            e
                        ))))
                    }
                };

                let status = response.status();
                if !status.is_success() {
                    let body = response.text().await.unwrap_or_default();
                    return Err(AttemptError::from_status(
                        status,
                        Error::llm(format!("Generation failed: HTTP {} - {}", status, body)),
                    ));
                }

                response.json::<GenerateResponse>().await.map_err(|e| {
                    AttemptError::Fatal(Error::llm(format!(
                        "Failed to parse generation response: {}",
                        e
                    )))
                })
            })
            .await?;

        let usage = LlmUsage::new(response.prompt_eval_count, response.eval_count);
        Ok((response.response.trim().to_string(), usage))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_response_usage_fields() {
        let raw = r#"{"model": "phi3", "response": "Sac blanc", "done": true,
                      "prompt_eval_count": 300, "eval_count": 12}"#;
        let parsed: GenerateResponse = serde_json::from_str(raw).unwrap();
        let usage = LlmUsage::new(parsed.prompt_eval_count, parsed.eval_count);
        assert_eq!(usage.total_tokens, 312);
    }

    #[test]
    fn test_missing_counters_default_to_zero() {
        let parsed: GenerateResponse = serde_json::from_str(r#"{"response": "ok"}"#).unwrap();
        assert_eq!(parsed.prompt_eval_count, 0);
        assert_eq!(parsed.eval_count, 0);
    }

    #[test]
    fn test_client_trims_base_url() {
        let ollama = OllamaConfig {
            base_url: "http://localhost:11434/".to_string(),
            ..OllamaConfig::default()
        };
        let client = OllamaClient::new(&ollama, &LlmConfig::default()).unwrap();
        assert_eq!(client.base_url, "http://localhost:11434");
        assert_eq!(client.generate_model(), "phi3");
    }
}
