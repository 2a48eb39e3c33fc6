//! Docseek server binary
//!
//! Run with: cargo run -p docseek --bin docseek-server
//! Set DOCSEEK_CONFIG to a TOML file to override defaults.

use docseek::{
    config::{EmbeddingBackend, RagConfig},
    server::RagServer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "docseek=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = RagConfig::from_env()?;

    tracing::info!("Configuration loaded");
    tracing::info!("  - Embedding backend: {:?}", config.embeddings.backend);
    tracing::info!("  - Embedding dimensions: {}", config.embeddings.dimensions);
    tracing::info!("  - Chunk budget: {} tokens", config.chunking.max_tokens);
    tracing::info!("  - LLM model: {}", config.llm.generate_model);
    tracing::info!("  - Index directory: {}", config.vector_db.storage_dir.display());

    // Ollama is only required for chat, and for embeddings on the ollama backend
    tracing::info!("Checking Ollama at {}...", config.llm.base_url);
    let client = reqwest::Client::new();
    match client
        .get(format!("{}/api/tags", config.llm.base_url))
        .send()
        .await
    {
        Ok(resp) if resp.status().is_success() => tracing::info!("Ollama is running"),
        _ if config.embeddings.backend == EmbeddingBackend::Ollama => {
            tracing::warn!("Ollama not available at {}; ingestion and search will fail", config.llm.base_url);
        }
        _ => tracing::warn!("Ollama not available at {}; chat will fail", config.llm.base_url),
    }

    let server = RagServer::new(config)?;

    println!("\nServer starting...");
    println!("  API: http://{}", server.address());
    println!("  Health: http://{}/health", server.address());
    println!("  API Info: http://{}/api/info", server.address());
    println!("\nPress Ctrl+C to stop\n");

    server.start().await?;

    Ok(())
}
