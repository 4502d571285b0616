//! Application state shared by the HTTP handlers and the CLI

use parking_lot::RwLock;
use std::sync::Arc;

use crate::agent::Assistant;
use crate::config::EcoConfig;
use crate::error::{Error, Result};
use crate::ingestion::{DocumentRegistry, GuideIndexer, IngestPipeline};
use crate::providers::{
    embedding_from_config, llm_from_config, EmbeddingProvider, LlmProvider, SqliteVectorStore,
    VectorStoreProvider,
};
use crate::region::{Region, RegionInfo};
use crate::vision::{WasteClassifier, YoloClassifier};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: EcoConfig,
    embedding_provider: Arc<dyn EmbeddingProvider>,
    vector_store_provider: Arc<dyn VectorStoreProvider>,
    llm_provider: Arc<dyn LlmProvider>,
    assistant: Assistant,
    indexer: GuideIndexer,
    /// `None` when the detector weights are not available
    classifier: Option<Arc<dyn WasteClassifier>>,
    ready: RwLock<bool>,
}

impl AppState {
    /// Build every component from the configuration
    pub async fn new(config: EcoConfig) -> Result<Self> {
        tracing::info!("Initializing Eco-Sorter application state...");

        let storage_dir = config.storage_dir();
        std::fs::create_dir_all(&storage_dir).map_err(|e| {
            Error::Config(format!(
                "Failed to create storage directory {}: {}",
                storage_dir.display(),
                e
            ))
        })?;

        let vector_store: Arc<dyn VectorStoreProvider> =
            Arc::new(SqliteVectorStore::open(&config.vector_db.storage_path)?);
        tracing::info!("Vector store initialized at {}", config.vector_db.storage_path.display());

        let embedding_provider = embedding_from_config(&config).await?;
        let llm_provider = llm_from_config(&config)?;

        let registry = Arc::new(DocumentRegistry::open(storage_dir.join("documents.json")));

        let classifier: Option<Arc<dyn WasteClassifier>> =
            match YoloClassifier::load(&config.vision) {
                Ok(classifier) => Some(Arc::new(classifier)),
                Err(e) => {
                    tracing::warn!("Photo classification disabled: {}", e);
                    None
                }
            };

        Ok(Self::with_components(
            config,
            embedding_provider,
            vector_store,
            llm_provider,
            registry,
            classifier,
        ))
    }

    /// Assemble the state from already-built components
    pub fn with_components(
        config: EcoConfig,
        embedding_provider: Arc<dyn EmbeddingProvider>,
        vector_store_provider: Arc<dyn VectorStoreProvider>,
        llm_provider: Arc<dyn LlmProvider>,
        registry: Arc<DocumentRegistry>,
        classifier: Option<Arc<dyn WasteClassifier>>,
    ) -> Self {
        let assistant = Assistant::new(
            embedding_provider.clone(),
            vector_store_provider.clone(),
            llm_provider.clone(),
            config.retrieval.top_k,
            config.footprint.co2_grams_per_token,
        );

        let indexer = GuideIndexer::new(
            IngestPipeline::new(config.chunking.chunk_size, config.chunking.chunk_overlap),
            embedding_provider.clone(),
            vector_store_provider.clone(),
            registry,
            config.embeddings.batch_size,
        );

        Self {
            inner: Arc::new(AppStateInner {
                config,
                embedding_provider,
                vector_store_provider,
                llm_provider,
                assistant,
                indexer,
                classifier,
                ready: RwLock::new(true),
            }),
        }
    }

    /// Get configuration
    pub fn config(&self) -> &EcoConfig {
        &self.inner.config
    }

    /// Get embedding provider
    pub fn embedding_provider(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.inner.embedding_provider
    }

    /// Get vector store provider
    pub fn vector_store_provider(&self) -> &Arc<dyn VectorStoreProvider> {
        &self.inner.vector_store_provider
    }

    /// Get LLM provider
    pub fn llm_provider(&self) -> &Arc<dyn LlmProvider> {
        &self.inner.llm_provider
    }

    pub fn assistant(&self) -> &Assistant {
        &self.inner.assistant
    }

    pub fn indexer(&self) -> &GuideIndexer {
        &self.inner.indexer
    }

    /// Document registry (persisted as `documents.json`)
    pub fn registry(&self) -> &Arc<DocumentRegistry> {
        self.inner.indexer.registry()
    }

    /// Photo classifier, if the detector weights were found
    pub fn classifier(&self) -> Option<&Arc<dyn WasteClassifier>> {
        self.inner.classifier.as_ref()
    }

    /// Every region with its number of indexed chunks
    pub async fn region_infos(&self) -> Result<Vec<RegionInfo>> {
        let mut regions = Vec::with_capacity(Region::ALL.len());
        for region in Region::ALL {
            let count = self.inner.vector_store_provider.count_by_region(region).await?;
            regions.push(RegionInfo::new(region, count));
        }
        Ok(regions)
    }

    /// Check if the server is ready
    pub fn is_ready(&self) -> bool {
        *self.inner.ready.read()
    }

    /// Set ready state
    pub fn set_ready(&self, ready: bool) {
        *self.inner.ready.write() = ready;
    }
}
