//! Region-aware question answering over the indexed guides

use std::sync::Arc;
use std::time::Instant;

use crate::error::{Error, Result};
use crate::generation::PromptBuilder;
use crate::providers::{EmbeddingProvider, LlmProvider, VectorStoreProvider};
use crate::region::Region;
use crate::types::{AskResponse, Metrics, SourceRef};

/// Answer shown whenever the pipeline fails
pub const APOLOGY: &str = "Désolé, une erreur est survenue.";

/// Retrieval, prompt assembly and generation for one question
pub struct Assistant {
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStoreProvider>,
    llm: Arc<dyn LlmProvider>,
    top_k: usize,
    co2_grams_per_token: f64,
}

impl Assistant {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStoreProvider>,
        llm: Arc<dyn LlmProvider>,
        top_k: usize,
        co2_grams_per_token: f64,
    ) -> Self {
        Self {
            embedder,
            store,
            llm,
            top_k: top_k.max(1),
            co2_grams_per_token,
        }
    }

    pub fn llm(&self) -> &Arc<dyn LlmProvider> {
        &self.llm
    }

    /// Answer `question` using only the guides of `region`
    pub async fn ask(&self, question: &str, region: Region) -> Result<AskResponse> {
        let start = Instant::now();
        let question = question.trim();
        if question.is_empty() {
            return Err(Error::InvalidRequest("question must not be empty".to_string()));
        }

        tracing::info!("Question for {}: \"{}\"", region, question);

        let query_embedding = self.embedder.embed(question).await?;
        let results = self
            .store
            .search(&query_embedding, self.top_k, region)
            .await?;

        if results.is_empty() {
            tracing::warn!("No indexed passages for {}", region);
        }

        let context = PromptBuilder::build_context(&results);
        let prompt = PromptBuilder::build_prompt(question, &context, region);
        let generation = self.llm.generate(&prompt).await?;

        let sources = results
            .iter()
            .map(|r| SourceRef {
                chunk_id: r.chunk.id,
                filename: r.chunk.source.clone(),
                page_number: r.chunk.page_number,
                similarity: r.similarity,
            })
            .collect();

        let metrics = Metrics::from_usage(generation.usage, self.co2_grams_per_token);
        let processing_time_ms = start.elapsed().as_millis() as u64;

        tracing::info!(
            "Answered in {}ms ({} passages, {} tokens, {})",
            processing_time_ms,
            results.len(),
            metrics.total_tokens,
            metrics.format_co2()
        );

        Ok(AskResponse {
            answer: generation.text,
            metrics,
            sources,
            region,
            processing_time_ms,
        })
    }

    /// Like [`ask`](Self::ask), but every failure becomes the apology answer
    pub async fn ask_or_apologize(&self, question: &str, region: Region) -> AskResponse {
        let start = Instant::now();
        match self.ask(question, region).await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!("Failed to answer question for {}: {}", region, e);
                AskResponse {
                    answer: APOLOGY.to_string(),
                    metrics: Metrics::zero(),
                    sources: Vec::new(),
                    region,
                    processing_time_ms: start.elapsed().as_millis() as u64,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{Generation, SqliteVectorStore};
    use crate::retrieval::VectorStore;
    use crate::types::{Chunk, Document, FileType, LlmUsage};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedEmbedder {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl EmbeddingProvider for FixedEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![1.0, 0.0])
        }

        fn dimensions(&self) -> usize {
            2
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    /// Records the last prompt; fails when `fail` is set
    struct RecordingLlm {
        prompt: Mutex<Option<String>>,
        fail: bool,
    }

    #[async_trait]
    impl LlmProvider for RecordingLlm {
        async fn generate(&self, prompt: &str) -> Result<Generation> {
            *self.prompt.lock() = Some(prompt.to_string());
            if self.fail {
                return Err(Error::llm("backend unavailable"));
            }
            Ok(Generation {
                text: "Dans le sac orange.".to_string(),
                usage: LlmUsage::new(900, 100),
            })
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(!self.fail)
        }

        fn name(&self) -> &str {
            "recording"
        }

        fn model(&self) -> &str {
            "test"
        }
    }

    fn chunk(region: Region, content: &str, embedding: Vec<f32>) -> Chunk {
        let doc = Document::new(
            "guide.pdf".to_string(),
            region,
            FileType::Pdf,
            format!("{}-{}", region.tag(), content),
            0,
        );
        let mut chunk = Chunk::new(&doc, content.to_string(), Some(3), 0, content.len(), 0);
        chunk.embedding = embedding;
        chunk
    }

    fn assistant(fail: bool) -> (Assistant, Arc<FixedEmbedder>, Arc<RecordingLlm>) {
        let store = VectorStore::in_memory().unwrap();
        store
            .insert_chunks(&[
                chunk(Region::Bruxelles, "Sac orange : déchets de cuisine", vec![1.0, 0.0]),
                chunk(Region::Bruxelles, "Sac bleu : PMC", vec![0.5, 0.5]),
                chunk(Region::Namur, "Conteneur vert : organiques", vec![1.0, 0.0]),
            ])
            .unwrap();

        let embedder = Arc::new(FixedEmbedder {
            calls: AtomicUsize::new(0),
        });
        let llm = Arc::new(RecordingLlm {
            prompt: Mutex::new(None),
            fail,
        });
        let assistant = Assistant::new(
            embedder.clone(),
            Arc::new(SqliteVectorStore::new(Arc::new(store))),
            llm.clone(),
            4,
            0.0004,
        );
        (assistant, embedder, llm)
    }

    #[tokio::test]
    async fn test_ask_uses_only_selected_region() {
        let (assistant, _, llm) = assistant(false);
        let response = assistant
            .ask("Où je mets mes épluchures d'orange ?", Region::Bruxelles)
            .await
            .unwrap();

        assert_eq!(response.answer, "Dans le sac orange.");
        assert_eq!(response.sources.len(), 2);
        assert_eq!(response.sources[0].filename, "guide.pdf");
        assert_eq!(response.sources[0].page_number, Some(3));
        assert!(response.sources[0].similarity >= response.sources[1].similarity);

        let prompt = llm.prompt.lock().clone().unwrap();
        assert!(prompt.contains("Sac orange : déchets de cuisine\n\nSac bleu : PMC"));
        assert!(!prompt.contains("Conteneur vert"));
    }

    #[tokio::test]
    async fn test_metrics_include_co2() {
        let (assistant, _, _) = assistant(false);
        let response = assistant.ask("Verre ?", Region::Bruxelles).await.unwrap();
        assert_eq!(response.metrics.total_tokens, 1000);
        assert!((response.metrics.co2_grams - 0.4).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_empty_region_still_asks_model() {
        let (assistant, _, llm) = assistant(false);
        let response = assistant.ask("Piles ?", Region::Mons).await.unwrap();

        assert!(response.sources.is_empty());
        let prompt = llm.prompt.lock().clone().unwrap();
        assert!(prompt.contains("CONTEXTE ISSU DU GUIDE DE TRI :\n\n"));
    }

    #[tokio::test]
    async fn test_empty_question_skips_providers() {
        let (assistant, embedder, llm) = assistant(false);
        let err = assistant.ask("   ", Region::Bruxelles).await.unwrap_err();

        assert!(matches!(err, Error::InvalidRequest(_)));
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
        assert!(llm.prompt.lock().is_none());
    }

    #[tokio::test]
    async fn test_failure_becomes_apology() {
        let (assistant, _, _) = assistant(true);
        let response = assistant.ask_or_apologize("Verre ?", Region::Bruxelles).await;

        assert_eq!(response.answer, APOLOGY);
        assert_eq!(response.metrics, Metrics::zero());
        assert!(response.sources.is_empty());
    }
}
