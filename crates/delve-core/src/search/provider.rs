//! SearchProvider trait definition.

use delve_types::search::SearchResult;

/// A web search backend.
///
/// `search` never fails: adapters absorb missing credentials and upstream
/// errors by returning a deterministic fallback result instead.
pub trait SearchProvider: Send + Sync {
    /// Human-readable backend name (e.g., "brave").
    fn name(&self) -> &str;

    /// Run one query and return normalized results, most relevant first.
    fn search(
        &self,
        query: &str,
    ) -> impl std::future::Future<Output = Vec<SearchResult>> + Send;
}
