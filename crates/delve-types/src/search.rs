//! Web search result types.

use serde::{Deserialize, Serialize};

/// A single normalized web search hit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub snippet: String,
    pub url: String,
}

/// The results obtained for one search query, in query-plan order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryResults {
    pub query: String,
    pub results: Vec<SearchResult>,
}

/// Errors from a search backend. Adapters convert these into fallback
/// results; they never reach the research workflow.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("search credentials not configured")]
    MissingCredentials,

    #[error("search request failed: {0}")]
    Request(String),

    #[error("search API error: {0}")]
    Status(u16),

    #[error("failed to parse search response: {0}")]
    Parse(String),
}
