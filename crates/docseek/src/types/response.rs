//! Response types for retrieval and ingestion

use serde::{Deserialize, Serialize};

/// A ranked passage from the fine stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passage {
    /// Cosine distance to the query (lower is closer)
    pub distance: f32,
    /// Passage text
    pub text: String,
    /// Owning document name
    pub document_name: String,
}

/// Response from document search
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentsResponse {
    pub query: String,
    /// Shortlisted document names, closest first
    pub documents: Vec<String>,
}

/// Response from passage search
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PassagesResponse {
    pub query: String,
    pub passages: Vec<Passage>,
}

/// Response from the chat endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    /// Generated answer
    pub answer: String,
    /// Passages used as context
    pub passages: Vec<Passage>,
    /// Processing time in milliseconds
    pub processing_time_ms: u64,
}

impl ChatResponse {
    /// Response when nothing relevant was indexed
    pub fn not_found(processing_time_ms: u64) -> Self {
        Self {
            answer: "I couldn't find relevant information in the documents to answer this question."
                .to_string(),
            passages: Vec::new(),
            processing_time_ms,
        }
    }
}

/// Summary of an ingested document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestedDocument {
    /// Caller-supplied document name
    pub name: String,
    /// Index key assigned to the document
    pub unique_id: String,
    /// Number of fragments stored
    pub fragments: usize,
}

/// Error during ingestion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestError {
    /// Filename that failed
    pub filename: String,
    /// Error message
    pub error: String,
}

/// Response from document ingestion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestResponse {
    /// True when every document was ingested
    pub success: bool,
    /// Ingested documents
    pub documents: Vec<IngestedDocument>,
    /// Processing time in milliseconds
    pub processing_time_ms: u64,
    /// Any errors encountered (partial success)
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<IngestError>,
}
