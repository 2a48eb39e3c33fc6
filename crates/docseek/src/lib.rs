//! docseek: multi-format document ingestion with two-stage semantic retrieval
//!
//! Documents are extracted to plain text, split into semantically coherent
//! fragments and embedded. A compressed summary of each document goes into a
//! summary index and every fragment into a fragment index. Queries first
//! shortlist documents from the summary index, then rank passages from the
//! fragment index restricted to that shortlist.

pub mod config;
pub mod error;
pub mod generation;
pub mod ingestion;
pub mod providers;
pub mod retrieval;
pub mod server;
pub mod types;

pub use config::RagConfig;
pub use error::{Error, Result};
pub use ingestion::{FileParser, IngestPipeline};
pub use retrieval::{FragmentStore, IndexContext, Retriever};
pub use types::{
    document::{DocumentSource, ExtractOptions, ExtractedText, Format},
    response::Passage,
};
