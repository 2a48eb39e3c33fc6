//! Write path: extracted text to fragments, embeddings and both indexes

use serde_json::Value;
use std::sync::Arc;

use crate::config::{PassageText, RagConfig};
use crate::error::{Error, Result};
use crate::providers::{check_dimensions, EmbeddingMode, EmbeddingProvider};
use crate::retrieval::{IndexContext, Metadata};
use crate::types::{DocumentSource, Fragment, IngestedDocument};

use super::chunker::SemanticChunker;
use super::parser::FileParser;
use super::text::summarize_for_embedding;

/// Metadata key holding the document name
pub const KEY_DOCUMENT: &str = "documento";
/// Metadata key holding the full extracted text
pub const KEY_ORIGINAL_TEXT: &str = "texto_original";
/// Metadata key holding a fragment's own text (fragment passage mode only)
pub const KEY_FRAGMENT_TEXT: &str = "texto_fragmento";
/// Metadata key holding the document name as its id
pub const KEY_ID: &str = "id";

/// Embedded document ready to be written to the indexes
#[derive(Debug, Clone)]
pub struct PreparedDocument {
    /// Caller-supplied document name
    pub name: String,
    /// Base id; fragments are keyed `<unique_id>_<index>`
    pub unique_id: String,
    metadata: Metadata,
    fragment_text: bool,
    summary_embedding: Vec<f32>,
    fragments: Vec<(Fragment, Vec<f32>)>,
}

impl PreparedDocument {
    /// Number of fragments
    pub fn fragment_count(&self) -> usize {
        self.fragments.len()
    }

    /// Store every fragment and the summary, then persist both indexes
    pub fn commit(self, ctx: &mut IndexContext) -> Result<IngestedDocument> {
        // Validate up front so a mismatch leaves both indexes untouched
        if let Some(expected) = ctx.fragments.dimensions() {
            for (_, embedding) in &self.fragments {
                check_dimensions(std::slice::from_ref(embedding), expected)?;
            }
        }
        if let Some(expected) = ctx.summary.dimensions() {
            check_dimensions(std::slice::from_ref(&self.summary_embedding), expected)?;
        }

        let fragment_count = self.fragments.len();
        for (fragment, embedding) in self.fragments {
            let mut metadata = self.metadata.clone();
            if self.fragment_text {
                metadata.insert(KEY_FRAGMENT_TEXT.to_string(), Value::String(fragment.text.clone()));
            }
            ctx.fragments.store(fragment.unique_id(), embedding, metadata)?;
        }

        ctx.summary
            .store(self.unique_id.clone(), self.summary_embedding, self.metadata)?;

        tracing::info!("Embeddings for {} saved with ID: {}", self.name, self.unique_id);
        ctx.persist()?;

        Ok(IngestedDocument {
            name: self.name,
            unique_id: self.unique_id,
            fragments: fragment_count,
        })
    }
}

/// Ingestion pipeline
#[derive(Clone)]
pub struct IngestPipeline {
    parser: FileParser,
    chunker: SemanticChunker,
    embedder: Arc<dyn EmbeddingProvider>,
    summary_max_tokens: usize,
    passage_text: PassageText,
}

impl IngestPipeline {
    /// Create a new pipeline
    pub fn new(
        parser: FileParser,
        chunker: SemanticChunker,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Self {
        Self {
            parser,
            chunker,
            embedder,
            summary_max_tokens: 2048,
            passage_text: PassageText::Document,
        }
    }

    /// Create from configuration
    pub fn from_config(
        config: &RagConfig,
        parser: FileParser,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Self {
        Self {
            summary_max_tokens: config.chunking.summary_max_tokens,
            passage_text: config.retrieval.passage_text,
            ..Self::new(parser, SemanticChunker::from_config(&config.chunking), embedder)
        }
    }

    /// Parser used for extraction
    pub fn parser(&self) -> &FileParser {
        &self.parser
    }

    /// Chunk and embed without touching the indexes
    pub async fn prepare(
        &self,
        text: &str,
        mut metadata: Metadata,
        doc_name: &str,
    ) -> Result<PreparedDocument> {
        let unique_id = format!("{}{}", doc_name, uuid::Uuid::new_v4());

        metadata.insert(KEY_ID.to_string(), Value::String(doc_name.to_string()));
        metadata.insert(KEY_DOCUMENT.to_string(), Value::String(doc_name.to_string()));
        metadata.insert(KEY_ORIGINAL_TEXT.to_string(), Value::String(text.to_string()));

        let texts = self.chunker.chunk(text, self.embedder.as_ref()).await?;
        let embeddings = self.embedder.embed(&texts, EmbeddingMode::Semantic).await?;
        if embeddings.len() != texts.len() {
            return Err(Error::embedding(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                embeddings.len()
            )));
        }

        let summary = summarize_for_embedding(text, self.summary_max_tokens);
        let summary_embedding = self
            .embedder
            .embed_one(&summary, EmbeddingMode::Semantic)
            .await?;

        let fragments = texts
            .into_iter()
            .enumerate()
            .map(|(index, text)| Fragment {
                text,
                document_id: unique_id.clone(),
                index,
            })
            .zip(embeddings)
            .collect();

        Ok(PreparedDocument {
            name: doc_name.to_string(),
            unique_id,
            metadata,
            fragment_text: self.passage_text == PassageText::Fragment,
            summary_embedding,
            fragments,
        })
    }

    /// Ingest already-extracted text, returning the document's base id
    pub async fn ingest(
        &self,
        ctx: &mut IndexContext,
        text: &str,
        metadata: Metadata,
        doc_name: &str,
    ) -> Result<String> {
        let prepared = self.prepare(text, metadata, doc_name).await?;
        Ok(prepared.commit(ctx)?.unique_id)
    }

    /// Extract on the blocking pool
    pub async fn extract(&self, source: DocumentSource) -> Result<String> {
        let parser = self.parser.clone();
        tokio::task::spawn_blocking(move || parser.extract_text(&source))
            .await
            .map_err(|e| Error::internal(format!("Extraction task failed: {}", e)))?
    }

    /// Extract and ingest one document
    pub async fn ingest_document(
        &self,
        ctx: &mut IndexContext,
        source: DocumentSource,
        metadata: Metadata,
    ) -> Result<IngestedDocument> {
        let name = source.name.clone();
        let text = self.extract(source).await?;
        let prepared = self.prepare(&text, metadata, &name).await?;
        prepared.commit(ctx)
    }

    /// Ingest many documents; one failure does not affect the others
    pub async fn ingest_documents(
        &self,
        ctx: &mut IndexContext,
        sources: Vec<DocumentSource>,
    ) -> Vec<Result<IngestedDocument>> {
        let mut results = Vec::with_capacity(sources.len());
        for source in sources {
            let name = source.name.clone();
            let result = self.ingest_document(ctx, source, Metadata::new()).await;
            if let Err(e) = &result {
                tracing::warn!("Failed to ingest '{}': {}", name, e);
            }
            results.push(result);
        }
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::HashingEmbedder;

    fn pipeline(passage_text: PassageText) -> IngestPipeline {
        let mut config = RagConfig::default();
        config.retrieval.passage_text = passage_text;
        config.chunking.max_tokens = 8;
        IngestPipeline::from_config(
            &config,
            FileParser::default(),
            Arc::new(HashingEmbedder::new(64).unwrap()),
        )
    }

    #[tokio::test]
    async fn test_ingest_writes_both_indexes() {
        let mut ctx = IndexContext::in_memory();
        let text = "Alpha beta gamma delta. Epsilon zeta eta theta.";
        let mut metadata = Metadata::new();
        metadata.insert("author".into(), Value::String("ana".into()));

        let id = pipeline(PassageText::Document)
            .ingest(&mut ctx, text, metadata, "notes.txt")
            .await
            .unwrap();

        assert!(id.starts_with("notes.txt"));
        assert_eq!(ctx.summary.len(), 1);
        let summary = ctx.summary.get(&id).unwrap();
        assert_eq!(summary.metadata[KEY_DOCUMENT], "notes.txt");
        assert_eq!(summary.metadata[KEY_ID], "notes.txt");
        assert_eq!(summary.metadata[KEY_ORIGINAL_TEXT], text);
        assert_eq!(summary.metadata["author"], "ana");

        // every fragment shares the document metadata and is keyed <id>_<i>
        assert!(ctx.fragments.len() >= 2);
        for (i, entry) in ctx.fragments.entries().enumerate() {
            assert_eq!(entry.unique_id, format!("{}_{}", id, i));
            assert_eq!(entry.metadata, summary.metadata);
        }
    }

    #[tokio::test]
    async fn test_fragment_text_mode_adds_key() {
        let mut ctx = IndexContext::in_memory();
        pipeline(PassageText::Fragment)
            .ingest(&mut ctx, "One two. Three four five six seven.", Metadata::new(), "a.txt")
            .await
            .unwrap();

        let first = ctx.fragments.entries().next().unwrap();
        assert_eq!(first.metadata[KEY_FRAGMENT_TEXT], "One two.");
        let summary = ctx.summary.entries().next().unwrap();
        assert!(!summary.metadata.contains_key(KEY_FRAGMENT_TEXT));
    }

    #[tokio::test]
    async fn test_batch_isolates_failures() {
        let mut ctx = IndexContext::in_memory();
        let results = pipeline(PassageText::Document)
            .ingest_documents(
                &mut ctx,
                vec![
                    DocumentSource::new("good.txt", b"Alpha Beta".to_vec()),
                    DocumentSource::new("bad.md", b"# nope".to_vec()),
                    DocumentSource::new("also.txt", b"Gamma Delta".to_vec()),
                ],
            )
            .await;

        assert!(results[0].is_ok());
        assert!(matches!(results[1], Err(Error::UnsupportedFormat(_))));
        assert_eq!(results[2].as_ref().unwrap().name, "also.txt");
        assert_eq!(ctx.document_count(), 2);
    }
}
