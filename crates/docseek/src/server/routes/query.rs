//! Search and chat endpoints

use axum::{
    extract::{Query, State},
    Json,
};
use std::time::Instant;

use crate::error::Result;
use crate::generation::{PromptBuilder, SYSTEM_PROMPT};
use crate::server::state::AppState;
use crate::types::{ChatResponse, DocumentsResponse, PassagesResponse, SearchQuery};

/// GET /api/search/documents - Shortlist of document names closest to the query
pub async fn search_documents(
    State(state): State<AppState>,
    Query(request): Query<SearchQuery>,
) -> Result<Json<DocumentsResponse>> {
    let k = request.k_or(state.config().retrieval.default_k);
    tracing::info!("Document search: \"{}\" (k={})", request.query, k);

    let index = state.index().read().await;
    let documents = state
        .retriever()
        .search_documents(&index, &request.query, k)
        .await?;

    Ok(Json(DocumentsResponse {
        query: request.query,
        documents,
    }))
}

/// GET /api/search/passages - Passages from the shortlisted documents
pub async fn search_passages(
    State(state): State<AppState>,
    Query(request): Query<SearchQuery>,
) -> Result<Json<PassagesResponse>> {
    let k = request.k_or(state.config().retrieval.default_k);
    tracing::info!("Passage search: \"{}\" (k={})", request.query, k);

    let index = state.index().read().await;
    let passages = state
        .retriever()
        .search_passages(&index, &request.query, k)
        .await?;

    Ok(Json(PassagesResponse {
        query: request.query,
        passages,
    }))
}

/// GET /api/chat - Answer the query with retrieved passages as context
pub async fn chat(
    State(state): State<AppState>,
    Query(request): Query<SearchQuery>,
) -> Result<Json<ChatResponse>> {
    let start = Instant::now();
    let k = request.k_or(state.config().retrieval.chat_k);
    tracing::info!("Chat: \"{}\" (k={})", request.query, k);

    let passages = {
        let index = state.index().read().await;
        state
            .retriever()
            .search_passages(&index, &request.query, k)
            .await?
    };

    if passages.is_empty() {
        return Ok(Json(ChatResponse::not_found(
            start.elapsed().as_millis() as u64,
        )));
    }

    let prompt = PromptBuilder::from_passages(&request.query, &passages);
    tracing::debug!("Prompt: {} chars from {} passages", prompt.len(), passages.len());

    let answer = state.llm().generate(SYSTEM_PROMPT, &prompt).await?;

    Ok(Json(ChatResponse {
        answer,
        passages,
        processing_time_ms: start.elapsed().as_millis() as u64,
    }))
}
