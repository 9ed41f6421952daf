//! Configuration types for Delve.
//!
//! `AppConfig` represents the top-level `config.toml` that controls the LLM
//! model, the search backend, and research worker behavior. Every field has a
//! default so an empty (or missing) file is a valid configuration.

use serde::{Deserialize, Serialize};

/// Top-level configuration, loaded from `~/.delve/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub research: ResearchConfig,
}

/// Completion provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Model identifier used for chat, tool calling and synthesis.
    #[serde(default = "default_model")]
    pub model: String,
    /// Output token cap for chat and tool-calling turns.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Output token cap for the synthesis call.
    #[serde(default = "default_synthesis_max_tokens")]
    pub synthesis_max_tokens: u32,
    /// Sampling temperature; provider default when unset.
    #[serde(default)]
    pub temperature: Option<f64>,
    /// Override of the Anthropic API base URL (proxies, tests).
    #[serde(default)]
    pub base_url: Option<String>,
}

fn default_model() -> String {
    "claude-3-5-sonnet-20241022".to_string()
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_synthesis_max_tokens() -> u32 {
    8192
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            max_tokens: default_max_tokens(),
            synthesis_max_tokens: default_synthesis_max_tokens(),
            temperature: None,
            base_url: None,
        }
    }
}

/// Web search backend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Search endpoint (Brave Search web search API).
    #[serde(default = "default_search_url")]
    pub endpoint: String,
    /// Number of results requested upstream.
    #[serde(default = "default_request_count")]
    pub request_count: u32,
    /// Number of results kept per query.
    #[serde(default = "default_max_results")]
    pub max_results: usize,
}

fn default_search_url() -> String {
    "https://api.search.brave.com/res/v1/web/search".to_string()
}

fn default_request_count() -> u32 {
    10
}

fn default_max_results() -> usize {
    5
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            endpoint: default_search_url(),
            request_count: default_request_count(),
            max_results: default_max_results(),
        }
    }
}

/// What to do when the synthesis output contains no parseable report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseFailurePolicy {
    /// Complete the job with a placeholder report carrying the raw text.
    #[default]
    Fallback,
    /// Fail the job.
    Fail,
}

/// Research workflow and worker pool settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchConfig {
    /// Number of concurrent research workers.
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Upper bound on provider round-trips per planned query in the tool loop.
    #[serde(default = "default_max_tool_iterations")]
    pub max_tool_iterations: usize,
    #[serde(default)]
    pub parse_failure_policy: ParseFailurePolicy,
    /// Maximum number of jobs returned by a listing.
    #[serde(default = "default_list_limit")]
    pub list_limit: i64,
}

fn default_workers() -> usize {
    4
}

fn default_max_tool_iterations() -> usize {
    8
}

fn default_list_limit() -> i64 {
    100
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            max_tool_iterations: default_max_tool_iterations(),
            parse_failure_policy: ParseFailurePolicy::default(),
            list_limit: default_list_limit(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_config_default_values() {
        let config = AppConfig::default();
        assert_eq!(config.llm.model, "claude-3-5-sonnet-20241022");
        assert_eq!(config.llm.max_tokens, 4096);
        assert_eq!(config.llm.synthesis_max_tokens, 8192);
        assert_eq!(config.search.request_count, 10);
        assert_eq!(config.search.max_results, 5);
        assert_eq!(config.research.workers, 4);
        assert_eq!(config.research.max_tool_iterations, 8);
        assert_eq!(config.research.parse_failure_policy, ParseFailurePolicy::Fallback);
        assert_eq!(config.research.list_limit, 100);
    }

    #[test]
    fn test_app_config_deserialize_empty() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert_eq!(config.llm.max_tokens, 4096);
        assert_eq!(config.research.workers, 4);
    }

    #[test]
    fn test_app_config_deserialize_with_values() {
        let toml_str = r#"
[llm]
model = "claude-sonnet-4-20250514"
temperature = 0.7

[research]
workers = 2
parse_failure_policy = "fail"
"#;
        let config: AppConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.llm.model, "claude-sonnet-4-20250514");
        assert_eq!(config.llm.temperature, Some(0.7));
        assert_eq!(config.llm.max_tokens, 4096);
        assert_eq!(config.research.workers, 2);
        assert_eq!(config.research.parse_failure_policy, ParseFailurePolicy::Fail);
        assert_eq!(config.research.max_tool_iterations, 8);
        assert_eq!(config.search.max_results, 5);
    }
}
