//! Brave Search web search adapter.
//!
//! Never fails the caller: without an API key, or on any upstream failure,
//! the adapter returns a single placeholder result for the query.

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};

use delve_core::search::provider::SearchProvider;
use delve_types::config::SearchConfig;
use delve_types::search::{SearchError, SearchResult};

const FALLBACK_URL: &str = "https://example.com";

/// [`SearchProvider`] backed by the Brave Search web search API.
pub struct BraveSearchProvider {
    client: reqwest::Client,
    api_key: Option<SecretString>,
    endpoint: String,
    request_count: u32,
    max_results: usize,
}

impl BraveSearchProvider {
    pub fn new(config: &SearchConfig, api_key: Option<SecretString>) -> Result<Self, SearchError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| SearchError::Request(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key,
            endpoint: config.endpoint.clone(),
            request_count: config.request_count,
            max_results: config.max_results,
        })
    }

    async fn fetch(&self, query: &str) -> Result<Vec<SearchResult>, SearchError> {
        let api_key = self.api_key.as_ref().ok_or(SearchError::MissingCredentials)?;

        let response = self
            .client
            .get(&self.endpoint)
            .header("Accept", "application/json")
            .header("X-Subscription-Token", api_key.expose_secret())
            .query(&[("q", query), ("count", &self.request_count.to_string())])
            .send()
            .await
            .map_err(|e| SearchError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SearchError::Status(status.as_u16()));
        }

        let payload: serde_json::Value = response
            .json()
            .await
            .map_err(|e| SearchError::Parse(e.to_string()))?;

        Ok(parse_results(&payload, self.max_results))
    }
}

impl SearchProvider for BraveSearchProvider {
    fn name(&self) -> &str {
        "brave"
    }

    async fn search(&self, query: &str) -> Vec<SearchResult> {
        match self.fetch(query).await {
            Ok(results) => results,
            Err(SearchError::MissingCredentials) => {
                tracing::warn!("BRAVE_SEARCH_API_KEY not set, using fallback search");
                vec![unconfigured_result(query)]
            }
            Err(e) => {
                tracing::error!(query, error = %e, "brave search failed");
                vec![failed_result(query)]
            }
        }
    }
}

/// Map `web.results[]` to [`SearchResult`]s, keeping at most `max` entries.
/// A response without `web.results` yields no results.
fn parse_results(payload: &serde_json::Value, max: usize) -> Vec<SearchResult> {
    let field = |row: &serde_json::Value, key: &str| {
        row.get(key)
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string()
    };

    payload
        .get("web")
        .and_then(|w| w.get("results"))
        .and_then(|r| r.as_array())
        .map(|rows| {
            rows.iter()
                .take(max)
                .map(|row| SearchResult {
                    title: field(row, "title"),
                    snippet: field(row, "description"),
                    url: field(row, "url"),
                })
                .collect()
        })
        .unwrap_or_default()
}

fn unconfigured_result(query: &str) -> SearchResult {
    SearchResult {
        title: format!("{query} - Search Result"),
        snippet: format!(
            "Information about {query}. Please configure BRAVE_SEARCH_API_KEY for real search results."
        ),
        url: FALLBACK_URL.to_string(),
    }
}

fn failed_result(query: &str) -> SearchResult {
    SearchResult {
        title: format!("{query} - Search Result"),
        snippet: format!("Search information about {query}"),
        url: FALLBACK_URL.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_truncates_and_defaults_missing_fields() {
        let rows: Vec<_> = (0..10)
            .map(|i| json!({"title": format!("t{i}"), "description": format!("d{i}"), "url": format!("https://r{i}.test")}))
            .collect();
        let payload = json!({"web": {"results": rows}});

        let results = parse_results(&payload, 5);
        assert_eq!(results.len(), 5);
        assert_eq!(results[0].title, "t0");
        assert_eq!(results[4].url, "https://r4.test");

        let payload = json!({"web": {"results": [{"url": "https://only-url.test"}]}});
        let results = parse_results(&payload, 5);
        assert_eq!(
            results,
            vec![SearchResult {
                title: String::new(),
                snippet: String::new(),
                url: "https://only-url.test".to_string(),
            }]
        );
    }

    #[test]
    fn parse_without_web_section_is_empty() {
        assert!(parse_results(&json!({"query": {"original": "x"}}), 5).is_empty());
    }

    #[tokio::test]
    async fn missing_key_returns_configuration_fallback() {
        let provider = BraveSearchProvider::new(&SearchConfig::default(), None).unwrap();

        let results = provider.search("Acme AI").await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].title, "Acme AI - Search Result");
        assert_eq!(
            results[0].snippet,
            "Information about Acme AI. Please configure BRAVE_SEARCH_API_KEY for real search results."
        );
        assert_eq!(results[0].url, "https://example.com");
    }

    #[tokio::test]
    async fn transport_failure_returns_error_fallback() {
        let config = SearchConfig {
            // Nothing listens on port 9; the request fails fast.
            endpoint: "http://127.0.0.1:9/res/v1/web/search".to_string(),
            ..SearchConfig::default()
        };
        let provider =
            BraveSearchProvider::new(&config, Some(SecretString::from("test-key"))).unwrap();

        let results = provider.search("Acme AI").await;
        assert_eq!(
            results,
            vec![SearchResult {
                title: "Acme AI - Search Result".to_string(),
                snippet: "Search information about Acme AI".to_string(),
                url: "https://example.com".to_string(),
            }]
        );
    }
}
