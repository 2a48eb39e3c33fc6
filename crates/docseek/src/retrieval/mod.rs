//! Similarity indexes and two-stage retrieval

mod context;
mod search;
pub mod store;

pub use context::IndexContext;
pub use search::Retriever;
pub use store::{
    cosine_similarity, or_filters, FilterClause, FragmentStore, IndexEntry, Metadata,
    SimilarityResult,
};
