//! Search strategies: how one planned query turns into search results.

use std::sync::Arc;

use delve_types::error::ResearchError;
use delve_types::research::AgentVariant;
use delve_types::search::QueryResults;

use crate::llm::box_provider::BoxLlmProvider;
use crate::search::box_provider::BoxSearchProvider;

use super::prompt::tool_search_prompt;
use super::queries::plan_queries;
use super::tool_loop::{ToolLoopSettings, run_tool_loop};

/// The pluggable search phase of a research job.
pub trait SearchStrategy: Send + Sync {
    fn variant(&self) -> AgentVariant;

    /// Ordered queries to run for `company`.
    fn plan(&self, company: &str) -> Vec<String> {
        plan_queries(self.variant(), company)
    }

    /// Execute one planned query. Returns the `{query, results}` pairs it
    /// produced, in order (possibly none).
    fn execute(
        &self,
        query: &str,
    ) -> impl std::future::Future<Output = Result<Vec<QueryResults>, ResearchError>> + Send;
}

/// Fixed pipeline: each planned query is searched directly, once.
pub struct DirectSearch {
    search: Arc<BoxSearchProvider>,
}

impl DirectSearch {
    pub fn new(search: Arc<BoxSearchProvider>) -> Self {
        Self { search }
    }
}

impl SearchStrategy for DirectSearch {
    fn variant(&self) -> AgentVariant {
        AgentVariant::FixedPipeline
    }

    async fn execute(&self, query: &str) -> Result<Vec<QueryResults>, ResearchError> {
        let results = self.search.search(query).await;
        Ok(vec![QueryResults {
            query: query.to_string(),
            results,
        }])
    }
}

/// Tool calling: the model decides which searches to run for each planned
/// query, via the `web_search` tool.
pub struct ToolCallingSearch {
    llm: Arc<BoxLlmProvider>,
    search: Arc<BoxSearchProvider>,
    settings: ToolLoopSettings,
}

impl ToolCallingSearch {
    pub fn new(
        llm: Arc<BoxLlmProvider>,
        search: Arc<BoxSearchProvider>,
        settings: ToolLoopSettings,
    ) -> Self {
        Self {
            llm,
            search,
            settings,
        }
    }
}

impl SearchStrategy for ToolCallingSearch {
    fn variant(&self) -> AgentVariant {
        AgentVariant::ToolCalling
    }

    async fn execute(&self, query: &str) -> Result<Vec<QueryResults>, ResearchError> {
        let prompt = tool_search_prompt(query);
        let gathered = run_tool_loop(&self.llm, &self.search, &self.settings, &prompt).await?;
        Ok(gathered)
    }
}
