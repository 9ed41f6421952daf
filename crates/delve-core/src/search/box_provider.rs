//! BoxSearchProvider: object-safe dynamic dispatch wrapper for SearchProvider.

use std::future::Future;
use std::pin::Pin;

use delve_types::search::SearchResult;

use super::provider::SearchProvider;

/// Object-safe version of [`SearchProvider`] with boxed futures.
pub trait SearchProviderDyn: Send + Sync {
    fn name(&self) -> &str;

    fn search_boxed<'a>(
        &'a self,
        query: &'a str,
    ) -> Pin<Box<dyn Future<Output = Vec<SearchResult>> + Send + 'a>>;
}

impl<T: SearchProvider> SearchProviderDyn for T {
    fn name(&self) -> &str {
        SearchProvider::name(self)
    }

    fn search_boxed<'a>(
        &'a self,
        query: &'a str,
    ) -> Pin<Box<dyn Future<Output = Vec<SearchResult>> + Send + 'a>> {
        Box::pin(self.search(query))
    }
}

/// Type-erased search provider.
pub struct BoxSearchProvider {
    inner: Box<dyn SearchProviderDyn + Send + Sync>,
}

impl BoxSearchProvider {
    pub fn new<T: SearchProvider + 'static>(provider: T) -> Self {
        Self {
            inner: Box::new(provider),
        }
    }

    pub fn name(&self) -> &str {
        self.inner.name()
    }

    pub async fn search(&self, query: &str) -> Vec<SearchResult> {
        self.inner.search_boxed(query).await
    }
}
