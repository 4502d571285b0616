//! Mistral chat completions client

use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::LlmConfig;
use crate::error::{Error, Result};
use crate::types::LlmUsage;

use super::retry::{AttemptError, RetryPolicy};

/// Client for `POST {base_url}/v1/chat/completions`
#[derive(Debug, Clone)]
pub struct MistralClient {
    client: Client,
    endpoint: String,
    base_url: String,
    model: String,
    temperature: f32,
    api_key: String,
    retry: RetryPolicy,
}

#[derive(Debug, Serialize)]
struct Message {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<Message>,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<UsageData>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UsageData {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
    #[serde(default)]
    total_tokens: Option<u32>,
}

impl MistralClient {
    /// Build a client; the API key must already be resolved
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| Error::Config("MISTRAL_API_KEY is not set".to_string()))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .pool_max_idle_per_host(5)
            .build()
            .map_err(|e| Error::llm(format!("Failed to build HTTP client: {}", e)))?;

        let base_url = config.base_url.trim_end_matches('/').to_string();

        Ok(Self {
            client,
            endpoint: format!("{}/v1/chat/completions", base_url),
            base_url,
            model: config.model.clone(),
            temperature: config.temperature,
            api_key,
            retry: RetryPolicy::new(config.max_retries),
        })
    }

    /// Model name
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Send `prompt` as a single user message
    pub async fn complete(&self, prompt: &str) -> Result<(String, LlmUsage)> {
        tracing::info!("Generating answer with model: {}", self.model);

        let body = ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![Message {
                role: "user",
                content: prompt.to_string(),
            }],
            temperature: self.temperature,
        };
        let body = &body;

        let parsed: ChatCompletionResponse = self
            .retry
            .run(|| async move {
                let response = match self
                    .client
                    .post(&self.endpoint)
                    .bearer_auth(&self.api_key)
                    .json(body)
                    .send()
                    .await
                {
                    Ok(response) => response,
                    Err(e) => {
                        return Err(AttemptError::Transient(Error::llm(format!(
                            "Request failed: {}",
                            e
                        ))))
                    }
                };

                let status = response.status();
                if !status.is_success() {
                    let text = response.text().await.unwrap_or_default();
                    return Err(AttemptError::from_status(
                        status,
                        Error::llm(format!("Mistral API error: HTTP {} - {}", status, text)),
                    ));
                }

                response.json::<ChatCompletionResponse>().await.map_err(|e| {
                    AttemptError::Fatal(Error::llm(format!("Failed to parse response: {}", e)))
                })
            })
            .await?;

        parse_completion(parsed)
    }

    /// Check the API is reachable with this key
    pub async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/v1/models", self.base_url);
        match self.client.get(&url).bearer_auth(&self.api_key).send().await {
            Ok(response) => Ok(response.status().is_success()),
            Err(_) => Ok(false),
        }
    }
}

fn parse_completion(parsed: ChatCompletionResponse) -> Result<(String, LlmUsage)> {
    let text = parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| Error::llm("Empty or missing content in response"))?;

    let usage = parsed
        .usage
        .map(|u| LlmUsage {
            input_tokens: u.prompt_tokens,
            output_tokens: u.completion_tokens,
            total_tokens: u
                .total_tokens
                .unwrap_or(u.prompt_tokens + u.completion_tokens),
        })
        .unwrap_or_default();

    tracing::debug!(
        input_tokens = usage.input_tokens,
        output_tokens = usage.output_tokens,
        "Received completion"
    );

    Ok((text, usage))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_completion_with_usage() {
        let raw = r#"{
            "id": "cmpl-1",
            "choices": [{"index": 0, "message": {"role": "assistant", "content": " Sac bleu. "}}],
            "usage": {"prompt_tokens": 812, "completion_tokens": 24, "total_tokens": 836}
        }"#;
        let parsed: ChatCompletionResponse = serde_json::from_str(raw).unwrap();
        let (text, usage) = parse_completion(parsed).unwrap();

        assert_eq!(text, "Sac bleu.");
        assert_eq!(
            usage,
            LlmUsage {
                input_tokens: 812,
                output_tokens: 24,
                total_tokens: 836,
            }
        );
    }

    #[test]
    fn test_parse_completion_without_usage() {
        let raw = r#"{"choices": [{"message": {"content": "Verre"}}]}"#;
        let parsed: ChatCompletionResponse = serde_json::from_str(raw).unwrap();
        let (_, usage) = parse_completion(parsed).unwrap();
        assert_eq!(usage, LlmUsage::default());
    }

    #[test]
    fn test_empty_choices_is_error() {
        let parsed: ChatCompletionResponse = serde_json::from_str(r#"{"choices": []}"#).unwrap();
        assert!(matches!(parse_completion(parsed), Err(Error::Llm(_))));
    }

    #[test]
    fn test_new_requires_key() {
        let config = LlmConfig::default();
        assert!(matches!(MistralClient::new(&config), Err(Error::Config(_))));

        let config = LlmConfig {
            api_key: Some("k".to_string()),
            base_url: "https://api.mistral.ai/".to_string(),
            ..LlmConfig::default()
        };
        let client = MistralClient::new(&config).unwrap();
        assert_eq!(client.endpoint, "https://api.mistral.ai/v1/chat/completions");
    }
}
