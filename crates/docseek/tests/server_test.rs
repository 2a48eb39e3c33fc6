//! Handler tests against in-memory state

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::extract::{FromRequest, Multipart, Query, State};
use axum::http::{header::CONTENT_TYPE, Request, StatusCode};
use axum::response::IntoResponse;
use docseek::config::VectorDbConfig;
use docseek::error::{Error, Result};
use docseek::generation::SYSTEM_PROMPT;
use docseek::providers::{HashingEmbedder, LlmProvider};
use docseek::retrieval::{IndexContext, Metadata};
use docseek::server::routes::{ingest, query};
use docseek::server::state::AppState;
use docseek::types::SearchQuery;
use docseek::RagConfig;

/// Records the last prompt and echoes a fixed answer
#[derive(Default)]
struct RecordingLlm {
    last: Mutex<Option<(String, String)>>,
}

#[async_trait]
impl LlmProvider for RecordingLlm {
    async fn generate(&self, system: &str, prompt: &str) -> Result<String> {
        *self.last.lock().unwrap() = Some((system.to_string(), prompt.to_string()));
        Ok("Alpha comes first.".to_string())
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "recording"
    }

    fn model(&self) -> &str {
        "recording"
    }
}

async fn state_with(texts: &[(&str, &str)], llm: Arc<RecordingLlm>) -> AppState {
    let state = AppState::from_parts(
        RagConfig::default(),
        IndexContext::in_memory(),
        Arc::new(HashingEmbedder::new(128).unwrap()),
        llm,
    );
    for (name, text) in texts {
        let prepared = state
            .pipeline()
            .prepare(text, Metadata::new(), name)
            .await
            .unwrap();
        state.commit(prepared).await.unwrap();
    }
    state
}

#[tokio::test]
async fn test_search_endpoints() {
    let state = state_with(&[("report.txt", "Alpha Beta Gamma Delta")], Arc::default()).await;

    let docs = query::search_documents(
        State(state.clone()),
        Query(SearchQuery::new("Alpha", 1)),
    )
    .await
    .unwrap()
    .0;
    assert_eq!(docs.query, "Alpha");
    assert_eq!(docs.documents, vec!["report.txt"]);

    let passages = query::search_passages(State(state), Query(SearchQuery::new("Alpha", 1)))
        .await
        .unwrap()
        .0;
    assert_eq!(passages.passages[0].text, "Alpha Beta Gamma Delta");
}

#[tokio::test]
async fn test_chat_sends_context_prompt() {
    let llm = Arc::new(RecordingLlm::default());
    let state = state_with(&[("report.txt", "Alpha Beta Gamma Delta")], llm.clone()).await;

    let response = query::chat(State(state), Query(SearchQuery::new("What is first?", 1)))
        .await
        .unwrap()
        .0;
    assert_eq!(response.answer, "Alpha comes first.");
    assert_eq!(response.passages.len(), 1);

    let (system, prompt) = llm.last.lock().unwrap().clone().unwrap();
    assert_eq!(system, SYSTEM_PROMPT);
    assert!(prompt.starts_with("Given the following context:\n<|context|>\nAlpha Beta Gamma Delta\n\n"));
    assert!(prompt.ends_with("<|endofcontext|>\n\n\nWhat is first?"));
}

#[tokio::test]
async fn test_chat_on_empty_index_skips_llm() {
    let llm = Arc::new(RecordingLlm::default());
    let state = state_with(&[], llm.clone()).await;

    let response = query::chat(State(state), Query(SearchQuery::new("anything", 1)))
        .await
        .unwrap()
        .0;
    assert!(response.passages.is_empty());
    assert!(llm.last.lock().unwrap().is_none());
}

#[tokio::test]
async fn test_info_reports_index_and_tools() {
    let state = state_with(&[("report.txt", "Alpha Beta Gamma Delta")], Arc::default()).await;

    let info = docseek::server::routes::info(State(state)).await.0;
    assert_eq!(info["documents"], 1);
    assert_eq!(info["embedder"], "hashing");
    for tool in ["tesseract", "djvutxt", "libreoffice"] {
        assert!(info["external_tools"][tool].is_boolean(), "{tool}");
    }
}

#[tokio::test]
async fn test_commit_persists_both_indexes() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = RagConfig::default();
    config.vector_db = VectorDbConfig::in_dir(dir.path());
    let index = IndexContext::open(&config.vector_db).unwrap();
    let state = AppState::from_parts(
        config.clone(),
        index,
        Arc::new(HashingEmbedder::new(64).unwrap()),
        Arc::new(RecordingLlm::default()),
    );

    let prepared = state
        .pipeline()
        .prepare("Alpha Beta Gamma Delta", Metadata::new(), "report.txt")
        .await
        .unwrap();
    let doc = state.commit(prepared).await.unwrap();
    assert_eq!(doc.name, "report.txt");

    let reopened = IndexContext::open(&config.vector_db).unwrap();
    assert_eq!(reopened.document_count(), 1);
    assert!(reopened.summary.get(&doc.unique_id).is_some());
}

#[tokio::test]
async fn test_malformed_upload_is_client_error() {
    let state = state_with(&[], Arc::default()).await;
    let request = Request::builder()
        .method("POST")
        .uri("/api/documents")
        .header(CONTENT_TYPE, "multipart/form-data; boundary=docseek-boundary")
        .body(Body::from("this body has no multipart boundary"))
        .unwrap();
    let multipart = Multipart::from_request(request, &()).await.unwrap();

    let err = ingest::ingest_documents(State(state), multipart)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidRequest(_)));
    assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
}
