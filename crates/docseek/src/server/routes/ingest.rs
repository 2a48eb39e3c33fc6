//! Document ingestion endpoint

use axum::{
    extract::{Multipart, State},
    Json,
};
use std::time::Instant;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::retrieval::Metadata;
use crate::server::state::AppState;
use crate::types::{DocumentSource, IngestError, IngestResponse};

/// POST /api/documents - Upload, extract and index files
///
/// Each file part becomes one document. An optional `metadata` part holding a
/// JSON object is attached to every document in the request.
pub async fn ingest_documents(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<IngestResponse>> {
    let start = Instant::now();
    let mut documents = Vec::new();
    let mut errors = Vec::new();
    let mut metadata = Metadata::new();
    let mut sources = Vec::new();

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        Error::InvalidRequest(format!("Failed to read multipart field: {}", e))
    })? {
        let name = field.name().unwrap_or("").to_string();

        if name == "metadata" {
            let data = field.bytes().await.map_err(|e| {
                Error::InvalidRequest(format!("Failed to read metadata: {}", e))
            })?;
            match serde_json::from_slice::<Metadata>(&data) {
                Ok(map) => metadata = map,
                Err(e) => tracing::warn!("Ignoring invalid metadata part: {}", e),
            }
            continue;
        }

        let filename = field
            .file_name()
            .map(|s| s.to_string())
            .unwrap_or_else(|| format!("file_{}", Uuid::new_v4()));

        match field.bytes().await {
            Ok(data) => {
                tracing::info!("Received file: {} ({} bytes)", filename, data.len());
                sources.push(DocumentSource::new(filename, data.to_vec()));
            }
            Err(e) => errors.push(IngestError {
                filename,
                error: format!("Failed to read file: {}", e),
            }),
        }
    }

    let pipeline = state.pipeline();
    for source in sources {
        let filename = source.name.clone();

        // Extraction and embedding run without the index lock
        let prepared = match pipeline.extract(source).await {
            Ok(text) => pipeline.prepare(&text, metadata.clone(), &filename).await,
            Err(e) => Err(e),
        };

        let result = match prepared {
            Ok(prepared) => state.commit(prepared).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(doc) => {
                tracing::info!("Ingested {} ({} fragments)", doc.name, doc.fragments);
                documents.push(doc);
            }
            Err(e) => {
                tracing::warn!("Failed to ingest {}: {}", filename, e);
                errors.push(IngestError {
                    filename,
                    error: e.to_string(),
                });
            }
        }
    }

    let processing_time_ms = start.elapsed().as_millis() as u64;
    tracing::info!(
        "Ingestion finished: {} documents, {} errors in {}ms",
        documents.len(),
        errors.len(),
        processing_time_ms
    );

    Ok(Json(IngestResponse {
        success: errors.is_empty(),
        documents,
        processing_time_ms,
        errors,
    }))
}
