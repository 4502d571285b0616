//! Answer generation: prompt assembly and LLM clients

pub mod mistral;
pub mod ollama;
pub mod prompt;
pub mod retry;

pub use mistral::MistralClient;
pub use ollama::OllamaClient;
pub use prompt::PromptBuilder;
pub use retry::{AttemptError, RetryPolicy};
