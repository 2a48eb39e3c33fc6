//! Application state for the retrieval server

use std::sync::Arc;
use tokio::sync::RwLock;

use crate::config::{EmbeddingBackend, RagConfig};
use crate::error::{Error, Result};
use crate::ingestion::{ExternalTools, FileParser, IngestPipeline, PreparedDocument};
use crate::providers::{
    ollama_providers, EmbeddingProvider, HashingEmbedder, LlmProvider, OllamaClient, OllamaLlm,
};
use crate::retrieval::{IndexContext, Retriever};
use crate::types::IngestedDocument;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: RagConfig,
    /// Both indexes; writers hold the lock only while committing
    index: Arc<RwLock<IndexContext>>,
    pipeline: IngestPipeline,
    retriever: Retriever,
    embedder: Arc<dyn EmbeddingProvider>,
    llm: Arc<dyn LlmProvider>,
}

impl AppState {
    /// Open the persisted indexes and build providers from configuration
    pub fn new(config: RagConfig) -> Result<Self> {
        tracing::info!(
            "Initializing application state (embeddings: {:?})...",
            config.embeddings.backend
        );

        let (embedder, llm): (Arc<dyn EmbeddingProvider>, Arc<dyn LlmProvider>) =
            match config.embeddings.backend {
                EmbeddingBackend::Hashing => {
                    let client = Arc::new(OllamaClient::new(&config.llm)?);
                    (
                        Arc::new(HashingEmbedder::new(config.embeddings.dimensions)?),
                        Arc::new(OllamaLlm::from_client(
                            client,
                            config.llm.generate_model.clone(),
                        )),
                    )
                }
                EmbeddingBackend::Ollama => {
                    let (embedder, llm) =
                        ollama_providers(&config.llm, config.embeddings.dimensions)?;
                    (Arc::new(embedder), Arc::new(llm))
                }
            };

        let index = IndexContext::open(&config.vector_db)?;
        tracing::info!(
            "Indexes loaded from {} ({} documents, {} fragments)",
            config.vector_db.storage_dir.display(),
            index.summary.len(),
            index.fragments.len()
        );

        Ok(Self::from_parts(config, index, embedder, llm))
    }

    /// Assemble state from prebuilt parts
    pub fn from_parts(
        config: RagConfig,
        index: IndexContext,
        embedder: Arc<dyn EmbeddingProvider>,
        llm: Arc<dyn LlmProvider>,
    ) -> Self {
        let parser = FileParser::new(ExternalTools::new(config.external_tools.clone()));
        let pipeline = IngestPipeline::from_config(&config, parser, Arc::clone(&embedder));
        let retriever = Retriever::new(Arc::clone(&embedder))
            .with_passage_text(config.retrieval.passage_text);

        Self {
            inner: Arc::new(AppStateInner {
                config,
                index: Arc::new(RwLock::new(index)),
                pipeline,
                retriever,
                embedder,
                llm,
            }),
        }
    }

    pub fn config(&self) -> &RagConfig {
        &self.inner.config
    }

    pub fn index(&self) -> &Arc<RwLock<IndexContext>> {
        &self.inner.index
    }

    /// Write a prepared document under the write lock. Storing and
    /// persisting both indexes runs on the blocking pool.
    pub async fn commit(&self, prepared: PreparedDocument) -> Result<IngestedDocument> {
        let mut index = Arc::clone(&self.inner.index).write_owned().await;
        tokio::task::spawn_blocking(move || prepared.commit(&mut index))
            .await
            .map_err(|e| Error::internal(format!("Commit task failed: {}", e)))?
    }

    pub fn pipeline(&self) -> &IngestPipeline {
        &self.inner.pipeline
    }

    pub fn retriever(&self) -> &Retriever {
        &self.inner.retriever
    }

    pub fn embedder(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.inner.embedder
    }

    pub fn llm(&self) -> &Arc<dyn LlmProvider> {
        &self.inner.llm
    }
}
