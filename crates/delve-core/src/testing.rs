//! In-memory test doubles shared by the unit tests of this crate.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use futures_util::stream;

use delve_types::error::RepositoryError;
use delve_types::llm::{
    CompletionRequest, CompletionResponse, ContentBlock, LlmError, ProviderCapabilities,
    StopReason, StreamEvent, Usage,
};
use delve_types::research::{
    JobId, JobStatus, ResearchJob, ResearchReport, ResearchStep,
};
use delve_types::search::SearchResult;

use crate::llm::provider::{LlmEventStream, LlmProvider};
use crate::repository::SortOrder;
use crate::repository::research::{JobFilter, ResearchRepository};
use crate::search::provider::SearchProvider;

pub const REPORT_JSON: &str = r#"{
  "currentInitiatives": "Runs several ML pilots",
  "yearPlans": {"year1": "a", "year2": "b", "year3": "c", "year4": "d", "year5": "e"},
  "technologyStack": ["PyTorch"],
  "partnerships": ["Acme Labs"],
  "marketPosition": "Fast follower"
}"#;

pub fn text_response(text: &str) -> CompletionResponse {
    CompletionResponse {
        id: "msg_text".to_string(),
        content: text.to_string(),
        blocks: vec![ContentBlock::Text {
            text: text.to_string(),
        }],
        model: "mock-model".to_string(),
        stop_reason: StopReason::EndTurn,
        usage: Usage::default(),
    }
}

/// A `tool_use` turn with one block per `(id, name, input)`.
pub fn tool_use_response(calls: &[(&str, &str, serde_json::Value)]) -> CompletionResponse {
    let blocks = calls
        .iter()
        .map(|(id, name, input)| ContentBlock::ToolUse {
            id: id.to_string(),
            name: name.to_string(),
            input: input.clone(),
        })
        .collect();
    CompletionResponse {
        id: "msg_tool".to_string(),
        content: String::new(),
        blocks,
        model: "mock-model".to_string(),
        stop_reason: StopReason::ToolUse,
        usage: Usage::default(),
    }
}

/// LLM double that replays scripted responses and records every request.
/// Once the script runs out it answers with `fallback_text`. Clones share
/// the script and the request log.
#[derive(Clone)]
pub struct ScriptedLlm {
    script: Arc<Mutex<VecDeque<Result<CompletionResponse, LlmError>>>>,
    fallback_text: String,
    pub requests: Arc<Mutex<Vec<CompletionRequest>>>,
    stream_chunks: Vec<String>,
    capabilities: ProviderCapabilities,
}

impl ScriptedLlm {
    pub fn new(script: Vec<Result<CompletionResponse, LlmError>>, fallback_text: &str) -> Self {
        Self {
            script: Arc::new(Mutex::new(script.into())),
            fallback_text: fallback_text.to_string(),
            requests: Arc::new(Mutex::new(Vec::new())),
            stream_chunks: Vec::new(),
            capabilities: ProviderCapabilities {
                streaming: true,
                tool_calling: true,
                max_context_tokens: 200_000,
                max_output_tokens: 8192,
            },
        }
    }

    pub fn with_stream_chunks(mut self, chunks: &[&str]) -> Self {
        self.stream_chunks = chunks.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

impl LlmProvider for ScriptedLlm {
    fn name(&self) -> &str {
        "scripted"
    }

    fn capabilities(&self) -> &ProviderCapabilities {
        &self.capabilities
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LlmError> {
        self.requests.lock().unwrap().push(request.clone());
        let next = self.script.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok(text_response(&self.fallback_text)))
    }

    fn stream(&self, request: CompletionRequest) -> LlmEventStream {
        self.requests.lock().unwrap().push(request);
        let mut events = vec![Ok(StreamEvent::Connected)];
        for (i, chunk) in self.stream_chunks.iter().enumerate() {
            events.push(Ok(StreamEvent::TextDelta {
                index: i as u32,
                text: chunk.clone(),
            }));
        }
        events.push(Ok(StreamEvent::MessageDelta {
            stop_reason: StopReason::EndTurn,
        }));
        events.push(Ok(StreamEvent::Done));
        Box::pin(stream::iter(events))
    }
}

/// Search double returning `per_query` results for every query.
#[derive(Clone)]
pub struct StaticSearch {
    per_query: usize,
    pub queries: Arc<Mutex<Vec<String>>>,
}

impl StaticSearch {
    pub fn new(per_query: usize) -> Self {
        Self {
            per_query,
            queries: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl SearchProvider for StaticSearch {
    fn name(&self) -> &str {
        "static"
    }

    async fn search(&self, query: &str) -> Vec<SearchResult> {
        self.queries.lock().unwrap().push(query.to_string());
        (0..self.per_query)
            .map(|i| SearchResult {
                title: format!("{query} #{i}"),
                snippet: format!("About {query}"),
                url: format!("https://example.test/{i}"),
            })
            .collect()
    }
}

/// Repository double with the same compare-and-set semantics as SQLite.
#[derive(Default)]
pub struct InMemoryRepository {
    jobs: Mutex<HashMap<JobId, ResearchJob>>,
    pub fail_appends: bool,
}

impl InMemoryRepository {
    pub fn failing_appends() -> Self {
        Self {
            fail_appends: true,
            ..Self::default()
        }
    }

    fn transition(
        &self,
        id: &JobId,
        from: JobStatus,
        to: JobStatus,
        apply: impl FnOnce(&mut ResearchJob),
    ) -> Result<(), RepositoryError> {
        let mut jobs = self.jobs.lock().unwrap();
        let job = jobs.get_mut(id).ok_or(RepositoryError::NotFound)?;
        if job.status != from {
            return Err(RepositoryError::StaleStatus { from, to });
        }
        job.status = to;
        apply(job);
        Ok(())
    }
}

impl ResearchRepository for InMemoryRepository {
    async fn create(&self, job: &ResearchJob) -> Result<(), RepositoryError> {
        let mut jobs = self.jobs.lock().unwrap();
        if jobs.contains_key(&job.id) {
            return Err(RepositoryError::Conflict(format!("job {} exists", job.id)));
        }
        jobs.insert(job.id, job.clone());
        Ok(())
    }

    async fn get(&self, id: &JobId) -> Result<Option<ResearchJob>, RepositoryError> {
        Ok(self.jobs.lock().unwrap().get(id).cloned())
    }

    async fn list(&self, filter: JobFilter) -> Result<Vec<ResearchJob>, RepositoryError> {
        let jobs = self.jobs.lock().unwrap();
        let mut out: Vec<ResearchJob> = jobs
            .values()
            .filter(|j| filter.status.is_none_or(|s| j.status == s))
            .filter(|j| filter.agent_variant.is_none_or(|v| j.agent_variant == v))
            .cloned()
            .collect();
        out.sort_by_key(|j| (j.created_at, j.id.0));
        if filter.sort_order.unwrap_or_default() == SortOrder::Desc {
            out.reverse();
        }
        if let Some(limit) = filter.limit {
            out.truncate(limit.max(0) as usize);
        }
        Ok(out)
    }

    async fn append_step(&self, id: &JobId, step: &ResearchStep) -> Result<(), RepositoryError> {
        if self.fail_appends {
            return Err(RepositoryError::Query("disk full".to_string()));
        }
        let mut jobs = self.jobs.lock().unwrap();
        let job = jobs.get_mut(id).ok_or(RepositoryError::NotFound)?;
        if job.status.is_terminal() {
            return Err(RepositoryError::Conflict(format!(
                "research job is {}; steps are closed",
                job.status
            )));
        }
        job.steps.push(step.clone());
        Ok(())
    }

    async fn mark_started(&self, id: &JobId) -> Result<(), RepositoryError> {
        self.transition(id, JobStatus::Pending, JobStatus::InProgress, |_| {})
    }

    async fn mark_completed(
        &self,
        id: &JobId,
        report: &ResearchReport,
    ) -> Result<(), RepositoryError> {
        self.transition(id, JobStatus::InProgress, JobStatus::Completed, |job| {
            job.result = Some(report.clone());
            job.completed_at = Some(Utc::now());
        })
    }

    async fn mark_failed(&self, id: &JobId, error: &str) -> Result<(), RepositoryError> {
        self.transition(id, JobStatus::InProgress, JobStatus::Failed, |job| {
            job.error = Some(error.to_string());
            job.completed_at = Some(Utc::now());
        })
    }
}
