//! Embedding provider trait for generating text embeddings

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Which representation an embedding captures
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingMode {
    /// Meaning-level similarity; used for chunking, indexing and queries
    #[default]
    Semantic,
    /// Surface-form similarity
    Textual,
}

/// Trait for generating text embeddings
///
/// Implementations:
/// - `HashingEmbedder`: deterministic feature hashing, no model needed
/// - `OllamaEmbedder`: Local Ollama server (nomic-embed-text)
///
/// Output must be deterministic for the same text and mode.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed every text, returning one vector per input in input order
    async fn embed(&self, texts: &[String], mode: EmbeddingMode) -> Result<Vec<Vec<f32>>>;

    /// Embed a single text
    async fn embed_one(&self, text: &str, mode: EmbeddingMode) -> Result<Vec<f32>> {
        self.embed(&[text.to_string()], mode)
            .await?
            .pop()
            .ok_or_else(|| Error::embedding("provider returned no vectors"))
    }

    /// Vector length produced for `mode`
    fn dimensions(&self, mode: EmbeddingMode) -> usize;

    /// Check if the provider is healthy and available
    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    /// Get provider name for logging
    fn name(&self) -> &str;
}

/// Fail with `DimensionMismatch` unless every vector has `expected` entries
pub fn check_dimensions(vectors: &[Vec<f32>], expected: usize) -> Result<()> {
    match vectors.iter().find(|v| v.len() != expected) {
        Some(v) => Err(Error::DimensionMismatch {
            expected,
            actual: v.len(),
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_dimensions() {
        assert!(check_dimensions(&[vec![0.0; 3], vec![1.0; 3]], 3).is_ok());
        let err = check_dimensions(&[vec![0.0; 3], vec![1.0; 4]], 3).unwrap_err();
        assert!(matches!(
            err,
            Error::DimensionMismatch {
                expected: 3,
                actual: 4
            }
        ));
    }
}
