//! The pair of indexes every pipeline operation works against

use crate::config::VectorDbConfig;
use crate::error::Result;

use super::store::FragmentStore;

/// Per-document summary index plus per-fragment index
#[derive(Debug)]
pub struct IndexContext {
    /// One entry per document, embedded from its compressed summary
    pub summary: FragmentStore,
    /// One entry per fragment
    pub fragments: FragmentStore,
}

impl IndexContext {
    /// Open both indexes from their backing files
    pub fn open(config: &VectorDbConfig) -> Result<Self> {
        Ok(Self {
            summary: FragmentStore::open("summary", config.summary_path())?,
            fragments: FragmentStore::open("fragments", config.fragment_path())?,
        })
    }

    /// Indexes that live only in memory
    pub fn in_memory() -> Self {
        Self {
            summary: FragmentStore::in_memory("summary"),
            fragments: FragmentStore::in_memory("fragments"),
        }
    }

    /// Persist both indexes, summary first
    pub fn persist(&mut self) -> Result<()> {
        self.summary.persist_to_disk()?;
        self.fragments.persist_to_disk()
    }

    /// Number of indexed documents
    pub fn document_count(&self) -> usize {
        self.summary.len()
    }
}
