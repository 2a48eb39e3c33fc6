//! Two-stage retrieval: document shortlist from the summary index, then
//! passages from the fragment index restricted to that shortlist

use std::sync::Arc;

use crate::config::PassageText;
use crate::error::Result;
use crate::ingestion::{KEY_DOCUMENT, KEY_FRAGMENT_TEXT, KEY_ORIGINAL_TEXT};
use crate::providers::{EmbeddingMode, EmbeddingProvider};
use crate::types::Passage;

use super::context::IndexContext;
use super::store::{or_filters, SimilarityResult};

/// Stateless retrieval orchestrator
#[derive(Clone)]
pub struct Retriever {
    embedder: Arc<dyn EmbeddingProvider>,
    passage_text: PassageText,
}

impl Retriever {
    /// Create a retriever returning document-level passage text
    pub fn new(embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            embedder,
            passage_text: PassageText::Document,
        }
    }

    /// Choose which text passages carry
    pub fn with_passage_text(mut self, passage_text: PassageText) -> Self {
        self.passage_text = passage_text;
        self
    }

    async fn embed_query(&self, query: &str) -> Result<Vec<f32>> {
        self.embedder.embed_one(query, EmbeddingMode::Semantic).await
    }

    /// Coarse stage: up to `k` distinct document names, closest first
    pub async fn search_documents(
        &self,
        ctx: &IndexContext,
        query: &str,
        k: usize,
    ) -> Result<Vec<String>> {
        if ctx.summary.is_empty() {
            return Ok(Vec::new());
        }
        let query_vec = self.embed_query(query).await?;
        Ok(shortlist(&ctx.summary.find_most_similar(&query_vec, k, &[])?))
    }

    /// Both stages with the same `k`
    pub async fn search_passages(
        &self,
        ctx: &IndexContext,
        query: &str,
        k: usize,
    ) -> Result<Vec<Passage>> {
        self.search_passages_with(ctx, query, k, k).await
    }

    /// Both stages with separate shortlist and passage counts
    pub async fn search_passages_with(
        &self,
        ctx: &IndexContext,
        query: &str,
        k_docs: usize,
        k_passages: usize,
    ) -> Result<Vec<Passage>> {
        if ctx.summary.is_empty() {
            return Ok(Vec::new());
        }
        let query_vec = self.embed_query(query).await?;

        let documents = shortlist(&ctx.summary.find_most_similar(&query_vec, k_docs, &[])?);
        if documents.is_empty() {
            return Ok(Vec::new());
        }
        tracing::debug!("Shortlisted {} documents for '{}'", documents.len(), query);

        let filters = or_filters(KEY_DOCUMENT, documents.iter().map(String::as_str));
        let hits = ctx
            .fragments
            .find_most_similar(&query_vec, k_passages, &filters)?;

        Ok(hits.iter().filter_map(|hit| self.to_passage(hit)).collect())
    }

    fn to_passage(&self, hit: &SimilarityResult) -> Option<Passage> {
        let text_key = match self.passage_text {
            PassageText::Document => KEY_ORIGINAL_TEXT,
            PassageText::Fragment => KEY_FRAGMENT_TEXT,
        };
        let text = hit
            .metadata
            .get(text_key)
            .or_else(|| hit.metadata.get(KEY_ORIGINAL_TEXT))
            .and_then(|v| v.as_str())?;
        let document_name = hit.metadata.get(KEY_DOCUMENT).and_then(|v| v.as_str())?;

        Some(Passage {
            distance: hit.distance,
            text: text.to_string(),
            document_name: document_name.to_string(),
        })
    }
}

/// Distinct `documento` values in rank order
fn shortlist(hits: &[SimilarityResult]) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for hit in hits {
        if let Some(name) = hit.metadata.get(KEY_DOCUMENT).and_then(|v| v.as_str()) {
            if !names.iter().any(|n| n == name) {
                names.push(name.to_string());
            }
        }
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::HashingEmbedder;
    use crate::retrieval::Metadata;
    use serde_json::json;

    fn meta(doc: &str, text: &str) -> Metadata {
        let mut m = Metadata::new();
        m.insert(KEY_DOCUMENT.into(), json!(doc));
        m.insert(KEY_ORIGINAL_TEXT.into(), json!(text));
        m
    }

    #[test]
    fn test_shortlist_dedupes_in_rank_order() {
        let hit = |id: &str, doc: &str| SimilarityResult {
            id: id.into(),
            distance: 0.0,
            metadata: meta(doc, ""),
        };
        let names = shortlist(&[hit("1", "b"), hit("2", "a"), hit("3", "b")]);
        assert_eq!(names, vec!["b", "a"]);
    }

    #[tokio::test]
    async fn test_empty_context() {
        let retriever = Retriever::new(Arc::new(HashingEmbedder::new(16).unwrap()));
        let ctx = IndexContext::in_memory();
        assert!(retriever.search_documents(&ctx, "Alpha", 3).await.unwrap().is_empty());
        assert!(retriever.search_passages(&ctx, "Alpha", 3).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_fine_stage_restricted_to_shortlist() {
        let embedder = HashingEmbedder::new(64).unwrap();
        let v = |t: &str| embedder.embed_text(t, EmbeddingMode::Semantic);

        let mut ctx = IndexContext::in_memory();
        ctx.summary.store("a", v("apples orchard"), meta("a.txt", "apples orchard")).unwrap();
        ctx.summary.store("b", v("boats harbor"), meta("b.txt", "boats harbor")).unwrap();
        // b's fragment matches the query exactly but b is not shortlisted
        ctx.fragments.store("a_0", v("apples"), meta("a.txt", "apples orchard")).unwrap();
        ctx.fragments.store("b_0", v("apples orchard"), meta("b.txt", "boats harbor")).unwrap();

        let retriever = Retriever::new(Arc::new(embedder.clone()));
        let passages = retriever
            .search_passages_with(&ctx, "apples orchard", 1, 5)
            .await
            .unwrap();
        assert_eq!(passages.len(), 1);
        assert_eq!(passages[0].document_name, "a.txt");
        assert_eq!(passages[0].text, "apples orchard");
    }

    #[tokio::test]
    async fn test_fragment_passage_text() {
        let embedder = HashingEmbedder::new(32).unwrap();
        let v = embedder.embed_text("alpha", EmbeddingMode::Semantic);

        let mut ctx = IndexContext::in_memory();
        ctx.summary.store("d", v.clone(), meta("d.txt", "alpha. beta.")).unwrap();
        let mut m = meta("d.txt", "alpha. beta.");
        m.insert(KEY_FRAGMENT_TEXT.into(), json!("alpha."));
        ctx.fragments.store("d_0", v, m).unwrap();

        let retriever = Retriever::new(Arc::new(embedder))
            .with_passage_text(PassageText::Fragment);
        let passages = retriever.search_passages(&ctx, "alpha", 1).await.unwrap();
        assert_eq!(passages[0].text, "alpha.");
    }
}
