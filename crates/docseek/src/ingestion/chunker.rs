//! Semantic chunking: sentences grouped by embedding similarity under a token budget

use unicode_segmentation::UnicodeSegmentation;

use crate::config::ChunkingConfig;
use crate::error::Result;
use crate::providers::{EmbeddingMode, EmbeddingProvider};
use crate::retrieval::cosine_similarity;

/// Rough token estimate (~4 characters per token)
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(4)
}

/// Splits text into semantically coherent fragments
#[derive(Debug, Clone)]
pub struct SemanticChunker {
    max_tokens: usize,
    similarity_threshold: f32,
    min_sentences: usize,
}

impl SemanticChunker {
    /// Create a new chunker
    pub fn new(max_tokens: usize, similarity_threshold: f32, min_sentences: usize) -> Self {
        Self {
            max_tokens: max_tokens.max(1),
            similarity_threshold,
            min_sentences: min_sentences.max(1),
        }
    }

    /// Create from configuration
    pub fn from_config(config: &ChunkingConfig) -> Self {
        Self::new(
            config.max_tokens,
            config.similarity_threshold,
            config.min_sentences,
        )
    }

    /// Token budget per fragment
    pub fn max_tokens(&self) -> usize {
        self.max_tokens
    }

    /// Chunk `text` with the configured token budget
    pub async fn chunk(&self, text: &str, embedder: &dyn EmbeddingProvider) -> Result<Vec<String>> {
        self.chunk_with_budget(text, self.max_tokens, embedder).await
    }

    /// Chunk `text` with an explicit token budget
    pub async fn chunk_with_budget(
        &self,
        text: &str,
        max_tokens: usize,
        embedder: &dyn EmbeddingProvider,
    ) -> Result<Vec<String>> {
        let sentences = split_sentences(text);
        if sentences.is_empty() {
            return Ok(Vec::new());
        }

        let owned: Vec<String> = sentences.iter().map(|s| s.to_string()).collect();
        let embeddings = embedder.embed(&owned, EmbeddingMode::Semantic).await?;
        Ok(self.group(&sentences, &embeddings, max_tokens.max(1)))
    }

    /// Group sentences given one embedding per sentence
    pub fn group(&self, sentences: &[&str], embeddings: &[Vec<f32>], max_tokens: usize) -> Vec<String> {
        let mut fragments = Vec::new();
        let mut current: Vec<&str> = Vec::new();
        let mut current_tokens = 0usize;
        let mut centroid: Vec<f32> = Vec::new();

        for (sentence, embedding) in sentences.iter().zip(embeddings) {
            let tokens = estimate_tokens(sentence);

            if !current.is_empty() {
                let over_budget = current_tokens + tokens > max_tokens;
                let drifted = current.len() >= self.min_sentences
                    && cosine_similarity(&centroid, embedding) < self.similarity_threshold;

                if over_budget || drifted {
                    fragments.push(current.join(" "));
                    current.clear();
                    current_tokens = 0;
                    centroid.clear();
                }
            }

            // Running mean of the group's sentence embeddings
            let n = current.len() as f32;
            if centroid.is_empty() {
                centroid = embedding.clone();
            } else {
                for (c, e) in centroid.iter_mut().zip(embedding) {
                    *c = (*c * n + e) / (n + 1.0);
                }
            }
            current.push(sentence);
            current_tokens += tokens;
        }

        if !current.is_empty() {
            fragments.push(current.join(" "));
        }
        fragments
    }
}

/// Split into trimmed, non-empty sentences
pub fn split_sentences(text: &str) -> Vec<&str> {
    text.split_sentence_bounds()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}
