//! API routes for the retrieval server

pub mod ingest;
pub mod query;

use axum::{
    extract::{DefaultBodyLimit, State},
    routing::{get, post},
    Json, Router,
};
use crate::server::state::AppState;

/// Build all API routes
pub fn api_routes(max_upload_size: usize) -> Router<AppState> {
    Router::new()
        // Ingestion - with larger body limit for file uploads
        .route(
            "/documents",
            post(ingest::ingest_documents).layer(DefaultBodyLimit::max(max_upload_size)),
        )
        .route("/search/documents", get(query::search_documents))
        .route("/search/passages", get(query::search_passages))
        .route("/chat", get(query::chat))
        .route("/info", get(info))
}

/// API info endpoint
pub async fn info(State(state): State<AppState>) -> Json<serde_json::Value> {
    let (documents, fragments) = {
        let index = state.index().read().await;
        (index.summary.len(), index.fragments.len())
    };

    let tools = state.pipeline().parser().tools().clone();
    let external_tools = tokio::task::spawn_blocking(move || tools.status())
        .await
        .ok();

    Json(serde_json::json!({
        "name": "docseek",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Multi-format document ingestion with two-stage semantic retrieval",
        "embedder": state.embedder().name(),
        "llm": state.llm().model(),
        "documents": documents,
        "fragments": fragments,
        "external_tools": external_tools,
        "endpoints": {
            "POST /api/documents": "Upload and index documents (multipart)",
            "GET /api/search/documents?query&k": "Closest document names",
            "GET /api/search/passages?query&k": "Closest passages from shortlisted documents",
            "GET /api/chat?query&k": "Answer using retrieved passages as context"
        }
    }))
}
