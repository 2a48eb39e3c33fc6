//! Deterministic feature-hashing embedder
//!
//! Semantic mode hashes lowercase word unigrams and bigrams; textual mode hashes
//! character trigrams. Vectors are L2-normalized. No model or network is needed,
//! which makes this the default backend and the one tests run against.

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use unicode_segmentation::UnicodeSegmentation;

use crate::error::{Error, Result};

use super::embedding::{EmbeddingMode, EmbeddingProvider};

/// Feature-hashing embedding provider
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimensions: usize,
}

impl HashingEmbedder {
    /// Create an embedder producing `dimensions`-length vectors
    pub fn new(dimensions: usize) -> Result<Self> {
        if dimensions == 0 {
            return Err(Error::Config("embedding dimensions must be positive".into()));
        }
        Ok(Self { dimensions })
    }

    /// Embed one text synchronously
    pub fn embed_text(&self, text: &str, mode: EmbeddingMode) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];
        for feature in features(text, mode) {
            let digest = Sha256::digest(feature.as_bytes());
            let mut bucket = [0u8; 8];
            bucket.copy_from_slice(&digest[..8]);
            let index = (u64::from_le_bytes(bucket) % self.dimensions as u64) as usize;
            let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
            vector[index] += sign;
        }

        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|x| *x /= norm);
        }
        vector
    }
}

fn features(text: &str, mode: EmbeddingMode) -> Vec<String> {
    let lower = text.to_lowercase();
    let words: Vec<&str> = lower.unicode_words().collect();
    match mode {
        EmbeddingMode::Semantic => {
            let mut out: Vec<String> = words.iter().map(|w| format!("w:{}", w)).collect();
            out.extend(words.windows(2).map(|p| format!("b:{} {}", p[0], p[1])));
            out
        }
        EmbeddingMode::Textual => words
            .iter()
            .flat_map(|w| {
                let chars: Vec<char> = format!("^{}$", w).chars().collect();
                chars
                    .windows(3)
                    .map(|t| format!("c:{}", t.iter().collect::<String>()))
                    .collect::<Vec<_>>()
            })
            .collect(),
    }
}

#[async_trait]
impl EmbeddingProvider for HashingEmbedder {
    async fn embed(&self, texts: &[String], mode: EmbeddingMode) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_text(t, mode)).collect())
    }

    fn dimensions(&self, _mode: EmbeddingMode) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        "hashing"
    }
}
