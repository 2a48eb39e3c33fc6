//! Core types for the retrieval pipeline

pub mod document;
pub mod query;
pub mod response;

pub use document::{
    DocumentSource, ExtractOptions, ExtractedText, Format, Fragment, ImageMode, Strategy,
    StructuredMode, TextBlock,
};
pub use query::SearchQuery;
pub use response::{
    ChatResponse, DocumentsResponse, IngestError, IngestResponse, IngestedDocument, Passage,
    PassagesResponse,
};
