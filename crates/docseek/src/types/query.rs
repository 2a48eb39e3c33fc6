//! Query request types

use serde::{Deserialize, Serialize};

/// Query string parameters shared by the search and chat endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchQuery {
    /// Natural-language query
    pub query: String,

    /// Number of results; the server default applies when absent
    #[serde(default)]
    pub k: Option<usize>,
}

impl SearchQuery {
    /// Create a query with an explicit `k`
    pub fn new(query: impl Into<String>, k: usize) -> Self {
        Self {
            query: query.into(),
            k: Some(k),
        }
    }

    /// Resolve `k`, falling back to `default_k`. Zero is raised to one.
    pub fn k_or(&self, default_k: usize) -> usize {
        self.k.unwrap_or(default_k).max(1)
    }
}
