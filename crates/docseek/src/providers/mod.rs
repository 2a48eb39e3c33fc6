//! Provider abstractions for embeddings and LLM
//!
//! Trait-based so the deterministic hashing embedder and a local Ollama server
//! are interchangeable.

pub mod embedding;
pub mod hashing;
pub mod llm;
pub mod ollama;

pub use embedding::{check_dimensions, EmbeddingMode, EmbeddingProvider};
pub use hashing::HashingEmbedder;
pub use llm::LlmProvider;
pub use ollama::{ollama_providers, OllamaClient, OllamaEmbedder, OllamaLlm};
