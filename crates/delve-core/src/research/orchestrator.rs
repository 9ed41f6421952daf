//! The research orchestrator: one workflow for every agent variant.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use delve_types::config::{AppConfig, ParseFailurePolicy};
use delve_types::error::ResearchError;
use delve_types::llm::{CompletionRequest, Message};
use delve_types::research::{AgentVariant, ResearchReport, ResearchStep};

use crate::llm::box_provider::BoxLlmProvider;
use crate::llm::instrumented_complete;
use crate::search::box_provider::BoxSearchProvider;

use super::parse::parse_report;
use super::progress::ProgressSink;
use super::prompt::synthesis_prompt;
use super::strategy::{DirectSearch, SearchStrategy, ToolCallingSearch};
use super::tool_loop::ToolLoopSettings;

/// Model and policy knobs for a research run.
#[derive(Debug, Clone)]
pub struct ResearchSettings {
    pub model: String,
    /// Output cap for each tool-calling turn.
    pub max_tokens: u32,
    /// Output cap for the synthesis call.
    pub synthesis_max_tokens: u32,
    pub temperature: Option<f64>,
    pub max_tool_iterations: usize,
    pub parse_failure_policy: ParseFailurePolicy,
}

impl ResearchSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            model: config.llm.model.clone(),
            max_tokens: config.llm.max_tokens,
            synthesis_max_tokens: config.llm.synthesis_max_tokens,
            temperature: config.llm.temperature,
            max_tool_iterations: config.research.max_tool_iterations,
            parse_failure_policy: config.research.parse_failure_policy,
        }
    }
}

/// Hands out steps with strictly increasing timestamps.
#[derive(Default)]
struct StepClock {
    last: Option<DateTime<Utc>>,
}

impl StepClock {
    fn step(&mut self, label: &str, detail: String) -> ResearchStep {
        let mut step = ResearchStep::new(label, detail);
        if let Some(last) = self.last {
            if step.timestamp <= last {
                step.timestamp = last + Duration::microseconds(1);
            }
        }
        self.last = Some(step.timestamp);
        step
    }
}

/// Runs the plan, search, synthesize, parse workflow.
pub struct ResearchOrchestrator {
    llm: Arc<BoxLlmProvider>,
    search: Arc<BoxSearchProvider>,
    settings: ResearchSettings,
}

impl ResearchOrchestrator {
    pub fn new(
        llm: Arc<BoxLlmProvider>,
        search: Arc<BoxSearchProvider>,
        settings: ResearchSettings,
    ) -> Self {
        Self {
            llm,
            search,
            settings,
        }
    }

    /// Research a company with the strategy matching `variant`.
    pub async fn research<P: ProgressSink>(
        &self,
        variant: AgentVariant,
        company_name: &str,
        company_website: &str,
        sink: &P,
    ) -> Result<ResearchReport, ResearchError> {
        match variant {
            AgentVariant::FixedPipeline => {
                let strategy = DirectSearch::new(self.search.clone());
                self.run(&strategy, company_name, company_website, sink).await
            }
            AgentVariant::ToolCalling => {
                let strategy = ToolCallingSearch::new(
                    self.llm.clone(),
                    self.search.clone(),
                    ToolLoopSettings {
                        model: self.settings.model.clone(),
                        max_tokens: self.settings.max_tokens,
                        temperature: self.settings.temperature,
                        max_iterations: self.settings.max_tool_iterations,
                    },
                );
                self.run(&strategy, company_name, company_website, sink).await
            }
        }
    }

    /// Run the workflow with an explicit search strategy.
    pub async fn run<S: SearchStrategy, P: ProgressSink>(
        &self,
        strategy: &S,
        company_name: &str,
        company_website: &str,
        sink: &P,
    ) -> Result<ResearchReport, ResearchError> {
        let mut clock = StepClock::default();

        sink.record(clock.step(
            "Starting research",
            format!("Beginning research on {company_name}"),
        ))
        .await;

        let queries = strategy.plan(company_name);
        sink.record(clock.step(
            "Planning research",
            format!("Created {} search queries for {company_name}", queries.len()),
        ))
        .await;

        let mut gathered = Vec::new();
        for query in &queries {
            let pairs = strategy.execute(query).await?;
            let found: usize = pairs.iter().map(|p| p.results.len()).sum();
            tracing::debug!(variant = %strategy.variant(), query = %query, found, "search executed");
            gathered.extend(pairs);
            sink.record(clock.step(
                "Executing search",
                format!("Searched: {query}, found {found} results"),
            ))
            .await;
        }

        sink.record(clock.step(
            "Synthesizing findings",
            "Analyzing search results and generating report".to_string(),
        ))
        .await;

        let prompt = synthesis_prompt(company_name, company_website, &gathered)?;
        let mut request = CompletionRequest::new(
            &self.settings.model,
            vec![Message::user(prompt)],
            self.settings.synthesis_max_tokens,
        );
        request.temperature = self.settings.temperature;
        let response = instrumented_complete(&self.llm, &request).await?;

        sink.record(clock.step(
            "Parsing results",
            "Extracting structured data from analysis".to_string(),
        ))
        .await;
        let report = parse_report(&response.content, self.settings.parse_failure_policy)?;

        sink.record(clock.step(
            "Research completed",
            "Successfully generated comprehensive report".to_string(),
        ))
        .await;

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{REPORT_JSON, ScriptedLlm, StaticSearch, text_response, tool_use_response};
    use delve_types::llm::LlmError;
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Default)]
    struct CollectingSink {
        steps: Mutex<Vec<ResearchStep>>,
    }

    impl CollectingSink {
        fn labels(&self) -> Vec<String> {
            self.steps.lock().unwrap().iter().map(|s| s.label.clone()).collect()
        }

        fn details(&self) -> Vec<String> {
            self.steps.lock().unwrap().iter().map(|s| s.detail.clone()).collect()
        }
    }

    impl ProgressSink for CollectingSink {
        async fn record(&self, step: ResearchStep) {
            self.steps.lock().unwrap().push(step);
        }
    }

    fn settings(policy: ParseFailurePolicy) -> ResearchSettings {
        ResearchSettings {
            model: "mock-model".to_string(),
            max_tokens: 4096,
            synthesis_max_tokens: 8192,
            temperature: None,
            max_tool_iterations: 8,
            parse_failure_policy: policy,
        }
    }

    fn orchestrator(
        llm: &ScriptedLlm,
        search: &StaticSearch,
        policy: ParseFailurePolicy,
    ) -> ResearchOrchestrator {
        ResearchOrchestrator::new(
            Arc::new(BoxLlmProvider::new(llm.clone())),
            Arc::new(BoxSearchProvider::new(search.clone())),
            settings(policy),
        )
    }

    #[tokio::test]
    async fn fixed_pipeline_emits_steps_in_order() {
        let llm = ScriptedLlm::new(vec![], REPORT_JSON);
        let search = StaticSearch::new(2);
        let sink = CollectingSink::default();

        let report = orchestrator(&llm, &search, ParseFailurePolicy::Fallback)
            .research(AgentVariant::FixedPipeline, "Acme", "https://acme.test", &sink)
            .await
            .unwrap();

        assert_eq!(report.market_position, "Fast follower");
        assert_eq!(
            sink.labels(),
            vec![
                "Starting research",
                "Planning research",
                "Executing search",
                "Executing search",
                "Executing search",
                "Executing search",
                "Synthesizing findings",
                "Parsing results",
                "Research completed",
            ]
        );
        let details = sink.details();
        assert_eq!(details[0], "Beginning research on Acme");
        assert_eq!(details[1], "Created 4 search queries for Acme");
        assert_eq!(details[2], "Searched: Acme AI initiatives current projects, found 2 results");
        assert_eq!(details[8], "Successfully generated comprehensive report");

        // One synthesis call, no tool calls.
        assert_eq!(llm.request_count(), 1);
        let requests = llm.requests.lock().unwrap();
        assert_eq!(requests[0].max_tokens, 8192);
        assert!(requests[0].tools.is_empty());
        assert!(requests[0].messages[0].content.text().contains("Acme AI plans future 2025-2030"));
    }

    #[tokio::test]
    async fn step_timestamps_strictly_increase() {
        let llm = ScriptedLlm::new(vec![], REPORT_JSON);
        let search = StaticSearch::new(0);
        let sink = CollectingSink::default();

        orchestrator(&llm, &search, ParseFailurePolicy::Fallback)
            .research(AgentVariant::FixedPipeline, "Acme", "https://acme.test", &sink)
            .await
            .unwrap();

        let steps = sink.steps.lock().unwrap();
        assert!(steps.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
        assert_eq!(steps[2].detail, "Searched: Acme AI initiatives current projects, found 0 results");
    }

    #[tokio::test]
    async fn tool_calling_counts_all_results_for_a_planned_query() {
        // First planned query triggers two tool searches; the rest none.
        let llm = ScriptedLlm::new(
            vec![
                Ok(tool_use_response(&[("a", "web_search", json!({"query": "x"}))])),
                Ok(tool_use_response(&[("b", "web_search", json!({"query": "y"}))])),
                Ok(text_response("done")),
                Ok(text_response("done")),
                Ok(text_response("done")),
                Ok(text_response("done")),
                Ok(text_response("done")),
            ],
            REPORT_JSON,
        );
        let search = StaticSearch::new(3);
        let sink = CollectingSink::default();

        let report = orchestrator(&llm, &search, ParseFailurePolicy::Fallback)
            .research(AgentVariant::ToolCalling, "Acme", "https://acme.test", &sink)
            .await
            .unwrap();
        assert_eq!(report.partnerships, vec!["Acme Labs"]);

        let details = sink.details();
        assert_eq!(details[1], "Created 5 search queries for Acme");
        assert_eq!(details[2], "Searched: Acme AI initiatives current projects, found 6 results");
        assert_eq!(details[3], "Searched: Acme artificial intelligence strategy roadmap, found 0 results");
        assert_eq!(sink.labels().len(), 10);

        // 3 + 4 tool-loop calls, then synthesis with the tool queries embedded.
        assert_eq!(llm.request_count(), 8);
        let requests = llm.requests.lock().unwrap();
        let synthesis = requests[7].messages[0].content.text();
        assert!(synthesis.contains("\"query\": \"x\""));
        assert!(synthesis.contains("\"query\": \"y\""));
    }

    #[tokio::test]
    async fn unparseable_synthesis_falls_back() {
        let llm = ScriptedLlm::new(vec![], "No structured data today.");
        let search = StaticSearch::new(1);
        let sink = CollectingSink::default();

        let report = orchestrator(&llm, &search, ParseFailurePolicy::Fallback)
            .research(AgentVariant::FixedPipeline, "Acme", "https://acme.test", &sink)
            .await
            .unwrap();
        assert_eq!(report, ResearchReport::fallback("No structured data today."));
        assert_eq!(sink.labels().last().unwrap(), "Research completed");
    }

    #[tokio::test]
    async fn unparseable_synthesis_fails_under_fail_policy() {
        let llm = ScriptedLlm::new(vec![], "No structured data today.");
        let search = StaticSearch::new(1);
        let sink = CollectingSink::default();

        let err = orchestrator(&llm, &search, ParseFailurePolicy::Fail)
            .research(AgentVariant::FixedPipeline, "Acme", "https://acme.test", &sink)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "failed to parse research results");
        assert_eq!(sink.labels().last().unwrap(), "Parsing results");
    }

    #[tokio::test]
    async fn synthesis_error_propagates_without_completion_step() {
        let llm = ScriptedLlm::new(
            vec![Err(LlmError::Provider {
                message: "upstream 500".to_string(),
            })],
            REPORT_JSON,
        );
        let search = StaticSearch::new(1);
        let sink = CollectingSink::default();

        let err = orchestrator(&llm, &search, ParseFailurePolicy::Fallback)
            .research(AgentVariant::FixedPipeline, "Acme", "https://acme.test", &sink)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "provider error: upstream 500");
        assert_eq!(sink.labels().last().unwrap(), "Synthesizing findings");
    }
}
