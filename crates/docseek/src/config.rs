//! Configuration for the retrieval pipeline

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::ingestion::ExternalToolsConfig;

/// Environment variable naming a TOML config file
pub const CONFIG_ENV_VAR: &str = "DOCSEEK_CONFIG";

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RagConfig {
    /// Server configuration
    pub server: ServerConfig,
    /// Embedding configuration
    pub embeddings: EmbeddingConfig,
    /// Chunking configuration
    pub chunking: ChunkingConfig,
    /// Ollama/LLM configuration
    pub llm: LlmConfig,
    /// Vector index configuration
    pub vector_db: VectorDbConfig,
    /// External tool configuration (OCR, djvu, legacy office)
    pub external_tools: ExternalToolsConfig,
    /// Retrieval configuration
    pub retrieval: RetrievalConfig,
}

impl RagConfig {
    /// Load configuration from a TOML file. Missing sections fall back to defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Invalid config: {}", e)))
    }

    /// Load from the file named by `DOCSEEK_CONFIG`, or use defaults when unset
    pub fn from_env() -> Result<Self> {
        match std::env::var_os(CONFIG_ENV_VAR) {
            Some(path) => Self::load(PathBuf::from(path)),
            None => Ok(Self::default()),
        }
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host address
    pub host: String,
    /// Port number
    pub port: u16,
    /// Enable CORS
    pub enable_cors: bool,
    /// Maximum upload size in bytes (default: 100MB)
    pub max_upload_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            enable_cors: true,
            max_upload_size: 100 * 1024 * 1024, // 100MB
        }
    }
}

/// Which embedding backend to use
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    /// Deterministic feature hashing, no model required
    #[default]
    Hashing,
    /// Ollama embeddings endpoint
    Ollama,
}

/// Embedding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Backend provider
    pub backend: EmbeddingBackend,
    /// Embedding dimensions (must match the model when using Ollama;
    /// nomic-embed-text produces 768)
    pub dimensions: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            backend: EmbeddingBackend::Hashing,
            dimensions: 768,
        }
    }
}

/// Semantic chunking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Maximum estimated tokens per fragment
    pub max_tokens: usize,
    /// Start a new fragment when sentence similarity drops below this (0-1)
    pub similarity_threshold: f32,
    /// Sentences that always open a fragment before the similarity check applies
    pub min_sentences: usize,
    /// Token cap for the compressed whole-document summary
    pub summary_max_tokens: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_tokens: 512,
            similarity_threshold: 0.5,
            min_sentences: 1,
            summary_max_tokens: 2048,
        }
    }
}

/// LLM (Ollama) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Ollama base URL
    pub base_url: String,
    /// Embedding model name
    pub embed_model: String,
    /// Generation model name
    pub generate_model: String,
    /// Temperature for generation
    pub temperature: f32,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Number of retries for failed requests
    pub max_retries: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            embed_model: "nomic-embed-text".to_string(),
            generate_model: "llama3.2:3b".to_string(),
            temperature: 0.3,
            timeout_secs: 120,
            max_retries: 2,
        }
    }
}

/// Vector index configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorDbConfig {
    /// Directory holding both index files
    pub storage_dir: PathBuf,
    /// File name of the per-document summary index
    pub summary_file: String,
    /// File name of the per-fragment index
    pub fragment_file: String,
}

impl VectorDbConfig {
    /// Use `dir` for both index files
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            storage_dir: dir.into(),
            ..Self::default()
        }
    }

    /// Full path of the summary index file
    pub fn summary_path(&self) -> PathBuf {
        self.storage_dir.join(&self.summary_file)
    }

    /// Full path of the fragment index file
    pub fn fragment_path(&self) -> PathBuf {
        self.storage_dir.join(&self.fragment_file)
    }
}

impl Default for VectorDbConfig {
    fn default() -> Self {
        let storage_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("docseek");

        Self {
            storage_dir,
            summary_file: "summary_index.json".to_string(),
            fragment_file: "fragment_index.json".to_string(),
        }
    }
}

/// Which text a retrieved passage carries
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PassageText {
    /// Full text of the owning document
    #[default]
    Document,
    /// Text of the matched fragment only
    Fragment,
}

/// Retrieval configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Default `k` for search endpoints
    pub default_k: usize,
    /// Default `k` for the chat endpoint
    pub chat_k: usize,
    /// Text returned with each passage
    pub passage_text: PassageText,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_k: 5,
            chat_k: 1,
            passage_text: PassageText::Document,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = RagConfig::from_toml(
            r#"
            [chunking]
            max_tokens = 128

            [retrieval]
            passage_text = "fragment"
            "#,
        )
        .unwrap();

        assert_eq!(config.chunking.max_tokens, 128);
        assert_eq!(config.chunking.similarity_threshold, 0.5);
        assert_eq!(config.retrieval.passage_text, PassageText::Fragment);
        assert_eq!(config.embeddings.backend, EmbeddingBackend::Hashing);
        assert_eq!(config.external_tools.ocr_languages, "rus+eng");
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let err = RagConfig::from_toml("chunking = 3").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_ollama_backend_defaults_match_embed_model() {
        let config = RagConfig::from_toml("[embeddings]\nbackend = \"ollama\"").unwrap();
        assert_eq!(config.embeddings.backend, EmbeddingBackend::Ollama);
        assert_eq!(config.llm.embed_model, "nomic-embed-text");
        assert_eq!(config.embeddings.dimensions, 768);
    }

    #[test]
    fn test_index_paths() {
        let db = VectorDbConfig::in_dir("/tmp/ds");
        assert_eq!(db.summary_path(), PathBuf::from("/tmp/ds/summary_index.json"));
        assert_eq!(db.fragment_path(), PathBuf::from("/tmp/ds/fragment_index.json"));
    }
}
