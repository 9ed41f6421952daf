//! Worker pool executing research jobs off an in-process queue.
//!
//! Job ids flow through an unbounded channel to a fixed number of workers.
//! Every queued or running job owns a `CancellationToken`; cancelling it
//! aborts the workflow at its next await point. On start the pool recovers
//! jobs a previous process left behind.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use delve_types::error::{JobError, RepositoryError, ResearchError};
use delve_types::research::{JobId, JobStatus, ResearchEvent, ResearchReport};

use crate::event::EventBus;
use crate::repository::SortOrder;
use crate::repository::research::{JobFilter, ResearchRepository};

use super::orchestrator::ResearchOrchestrator;
use super::progress::RepositorySink;

/// Error recorded on jobs found in progress at startup.
pub const INTERRUPTED_BY_RESTART: &str = "interrupted by restart";

/// Counts from a startup recovery pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    pub failed: usize,
    pub requeued: usize,
}

struct PoolInner<R: ResearchRepository> {
    repo: Arc<R>,
    orchestrator: Arc<ResearchOrchestrator>,
    bus: EventBus,
    queue: mpsc::UnboundedSender<JobId>,
    receiver: Mutex<mpsc::UnboundedReceiver<JobId>>,
    tokens: DashMap<JobId, CancellationToken>,
    shutdown: CancellationToken,
}

/// Fixed-size pool of research workers.
pub struct ResearchWorkerPool<R: ResearchRepository + 'static> {
    inner: Arc<PoolInner<R>>,
    workers: usize,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl<R: ResearchRepository + 'static> ResearchWorkerPool<R> {
    pub fn new(
        repo: Arc<R>,
        orchestrator: Arc<ResearchOrchestrator>,
        bus: EventBus,
        workers: usize,
    ) -> Self {
        let (queue, receiver) = mpsc::unbounded_channel();
        Self {
            inner: Arc::new(PoolInner {
                repo,
                orchestrator,
                bus,
                queue,
                receiver: Mutex::new(receiver),
                tokens: DashMap::new(),
                shutdown: CancellationToken::new(),
            }),
            workers: workers.max(1),
            handles: Mutex::new(Vec::new()),
        }
    }

    /// Recover jobs left behind by a previous process, then spawn workers.
    pub async fn start(&self) -> Result<RecoveryReport, JobError> {
        let report = self.recover().await?;
        self.spawn_workers().await;
        tracing::info!(
            workers = self.workers,
            failed = report.failed,
            requeued = report.requeued,
            "research worker pool started"
        );
        Ok(report)
    }

    /// Spawn workers without a recovery pass. Only jobs enqueued through
    /// this pool run; records owned by another process are left alone.
    pub async fn spawn_workers(&self) {
        let mut handles = self.handles.lock().await;
        if !handles.is_empty() {
            return;
        }
        for worker in 0..self.workers {
            let inner = self.inner.clone();
            handles.push(tokio::spawn(async move { inner.worker_loop(worker).await }));
        }
    }

    /// Fail jobs stuck in progress and re-enqueue pending jobs, oldest first.
    pub async fn recover(&self) -> Result<RecoveryReport, JobError> {
        let repo = &self.inner.repo;
        let mut report = RecoveryReport::default();

        let stale = repo
            .list(JobFilter {
                status: Some(JobStatus::InProgress),
                sort_order: Some(SortOrder::Asc),
                ..JobFilter::default()
            })
            .await?;
        for job in stale {
            match repo.mark_failed(&job.id, INTERRUPTED_BY_RESTART).await {
                Ok(()) => {
                    tracing::warn!(job_id = %job.id, "research job interrupted by restart");
                    self.inner.publish_finished(
                        job.id,
                        JobStatus::Failed,
                        Some(INTERRUPTED_BY_RESTART),
                    );
                    report.failed += 1;
                }
                Err(e) => tracing::error!(job_id = %job.id, error = %e, "failed to recover job"),
            }
        }

        let pending = repo
            .list(JobFilter {
                status: Some(JobStatus::Pending),
                sort_order: Some(SortOrder::Asc),
                ..JobFilter::default()
            })
            .await?;
        for job in pending {
            self.enqueue(job.id)?;
            report.requeued += 1;
        }

        Ok(report)
    }

    /// Queue a pending job for execution.
    pub fn enqueue(&self, id: JobId) -> Result<(), JobError> {
        self.inner.tokens.entry(id).or_insert_with(CancellationToken::new);
        self.inner.queue.send(id).map_err(|_| {
            self.inner.tokens.remove(&id);
            JobError::QueueClosed
        })
    }

    /// Cancel a pending or running job.
    ///
    /// A running job is failed by its worker once the workflow stops. A
    /// pending job is failed here, through in-progress, and skipped when a
    /// worker dequeues it.
    pub async fn cancel(&self, id: JobId) -> Result<(), JobError> {
        let repo = &self.inner.repo;
        let job = repo.get(&id).await?.ok_or(JobError::NotFound)?;
        if job.status.is_terminal() {
            return Err(JobError::AlreadyFinished(job.status));
        }

        let token = self.inner.tokens.get(&id).map(|t| t.clone());
        if let Some(token) = &token {
            token.cancel();
        }

        match job.status {
            JobStatus::Pending => match repo.mark_started(&id).await {
                Ok(()) => {
                    self.inner.fail(id, &ResearchError::Cancelled.to_string()).await;
                    Ok(())
                }
                // A worker took it first; the token stops it.
                Err(RepositoryError::StaleStatus { .. }) if token.is_some() => Ok(()),
                Err(e) => Err(e.into()),
            },
            JobStatus::InProgress if token.is_none() => {
                // Not owned by this process's workers.
                self.inner.fail(id, &ResearchError::Cancelled.to_string()).await;
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Whether the job currently holds a live cancellation token.
    pub fn is_tracked(&self, id: &JobId) -> bool {
        self.inner.tokens.contains_key(id)
    }

    /// Stop all workers. Jobs still running stay in progress and are
    /// recovered on the next start.
    pub async fn shutdown(&self) {
        self.inner.shutdown.cancel();
        let handles = std::mem::take(&mut *self.handles.lock().await);
        for handle in handles {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "research worker ended abnormally");
            }
        }
        tracing::info!("research worker pool stopped");
    }
}

impl<R: ResearchRepository + 'static> PoolInner<R> {
    async fn worker_loop(self: Arc<Self>, worker: usize) {
        tracing::debug!(worker, "research worker started");
        loop {
            let next = {
                let mut rx = self.receiver.lock().await;
                tokio::select! {
                    _ = self.shutdown.cancelled() => None,
                    id = rx.recv() => id,
                }
            };
            let Some(id) = next else { break };
            self.run_job(worker, id).await;
        }
        tracing::debug!(worker, "research worker stopped");
    }

    async fn run_job(&self, worker: usize, id: JobId) {
        let token = self
            .tokens
            .entry(id)
            .or_insert_with(CancellationToken::new)
            .clone();
        if token.is_cancelled() {
            self.tokens.remove(&id);
            return;
        }

        let job = match self.repo.get(&id).await {
            Ok(Some(job)) => job,
            Ok(None) => {
                tracing::warn!(job_id = %id, "queued research job no longer exists");
                self.tokens.remove(&id);
                return;
            }
            Err(e) => {
                tracing::error!(job_id = %id, error = %e, "failed to load research job");
                self.tokens.remove(&id);
                return;
            }
        };

        if let Err(e) = self.repo.mark_started(&id).await {
            tracing::debug!(job_id = %id, error = %e, "research job not startable, skipping");
            self.tokens.remove(&id);
            return;
        }

        let span = tracing::info_span!(
            "research.job",
            job_id = %id,
            worker,
            variant = %job.agent_variant,
            company = %job.company_name,
        );
        tracing::info!(parent: &span, "research job started");
        let sink = RepositorySink::new(self.repo.clone(), self.bus.clone(), id);
        let outcome: Result<ResearchReport, ResearchError> = tokio::select! {
            _ = token.cancelled() => Err(ResearchError::Cancelled),
            _ = self.shutdown.cancelled() => {
                tracing::info!(parent: &span, "shutdown while running, job left in progress");
                self.tokens.remove(&id);
                return;
            }
            result = self
                .orchestrator
                .research(job.agent_variant, &job.company_name, &job.company_website, &sink)
                .instrument(span.clone()) => result,
        };
        self.tokens.remove(&id);

        match outcome {
            Ok(report) => match self.repo.mark_completed(&id, &report).await {
                Ok(()) => {
                    tracing::info!(parent: &span, "research job completed");
                    self.publish_finished(id, JobStatus::Completed, None);
                }
                Err(e) => {
                    tracing::error!(parent: &span, error = %e, "failed to record research result")
                }
            },
            Err(e) => {
                tracing::warn!(parent: &span, error = %e, "research job failed");
                self.fail(id, &e.to_string()).await;
            }
        }
    }

    async fn fail(&self, id: JobId, error: &str) {
        match self.repo.mark_failed(&id, error).await {
            Ok(()) => self.publish_finished(id, JobStatus::Failed, Some(error)),
            Err(e) => tracing::error!(job_id = %id, error = %e, "failed to record research failure"),
        }
    }

    fn publish_finished(&self, job_id: JobId, status: JobStatus, error: Option<&str>) {
        self.bus.publish(ResearchEvent::Finished {
            job_id,
            status,
            error: error.map(str::to_string),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::box_provider::BoxLlmProvider;
    use crate::research::orchestrator::ResearchSettings;
    use crate::search::box_provider::BoxSearchProvider;
    use crate::testing::{InMemoryRepository, REPORT_JSON, ScriptedLlm, StaticSearch};
    use delve_types::config::ParseFailurePolicy;
    use delve_types::research::{AgentVariant, ResearchJob};
    use std::time::Duration;

    fn orchestrator(llm: ScriptedLlm) -> Arc<ResearchOrchestrator> {
        Arc::new(ResearchOrchestrator::new(
            Arc::new(BoxLlmProvider::new(llm)),
            Arc::new(BoxSearchProvider::new(StaticSearch::new(1))),
            ResearchSettings {
                model: "mock-model".to_string(),
                max_tokens: 1024,
                synthesis_max_tokens: 2048,
                temperature: None,
                max_tool_iterations: 8,
                parse_failure_policy: ParseFailurePolicy::Fallback,
            },
        ))
    }

    async fn wait_for_terminal(repo: &InMemoryRepository, id: JobId) -> ResearchJob {
        for _ in 0..200 {
            let job = repo.get(&id).await.unwrap().unwrap();
            if job.status.is_terminal() {
                return job;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("job {id} did not finish");
    }

    /// LLM double whose completions never return.
    struct HangingLlm(delve_types::llm::ProviderCapabilities);

    impl crate::llm::provider::LlmProvider for HangingLlm {
        fn name(&self) -> &str {
            "hanging"
        }
        fn capabilities(&self) -> &delve_types::llm::ProviderCapabilities {
            &self.0
        }
        async fn complete(
            &self,
            _request: &delve_types::llm::CompletionRequest,
        ) -> Result<delve_types::llm::CompletionResponse, delve_types::llm::LlmError> {
            std::future::pending().await
        }
        fn stream(
            &self,
            _request: delve_types::llm::CompletionRequest,
        ) -> crate::llm::provider::LlmEventStream {
            Box::pin(futures_util::stream::empty())
        }
    }

    fn hanging_orchestrator() -> Arc<ResearchOrchestrator> {
        Arc::new(ResearchOrchestrator::new(
            Arc::new(BoxLlmProvider::new(HangingLlm(
                delve_types::llm::ProviderCapabilities {
                    streaming: false,
                    tool_calling: true,
                    max_context_tokens: 1000,
                    max_output_tokens: 1000,
                },
            ))),
            Arc::new(BoxSearchProvider::new(StaticSearch::new(1))),
            ResearchSettings {
                model: "mock-model".to_string(),
                max_tokens: 1024,
                synthesis_max_tokens: 2048,
                temperature: None,
                max_tool_iterations: 8,
                parse_failure_policy: ParseFailurePolicy::Fallback,
            },
        ))
    }

    #[tokio::test]
    async fn runs_queued_job_to_completion() {
        let repo = Arc::new(InMemoryRepository::default());
        let bus = EventBus::new(64);
        let mut rx = bus.subscribe();
        let pool = ResearchWorkerPool::new(
            repo.clone(),
            orchestrator(ScriptedLlm::new(vec![], REPORT_JSON)),
            bus,
            2,
        );
        pool.start().await.unwrap();

        let job = ResearchJob::new("Acme", "https://acme.test", AgentVariant::FixedPipeline);
        repo.create(&job).await.unwrap();
        pool.enqueue(job.id).unwrap();

        let done = wait_for_terminal(&repo, job.id).await;
        assert_eq!(done.status, JobStatus::Completed);
        assert!(done.completed_at.is_some());
        assert_eq!(done.steps.len(), 9);
        assert_eq!(done.result.unwrap().market_position, "Fast follower");
        assert!(!pool.is_tracked(&job.id));

        let mut finished = None;
        while let Ok(event) = rx.try_recv() {
            if let ResearchEvent::Finished { status, .. } = event {
                finished = Some(status);
            }
        }
        assert_eq!(finished, Some(JobStatus::Completed));

        pool.shutdown().await;
    }

    #[tokio::test]
    async fn provider_failure_marks_job_failed() {
        let repo = Arc::new(InMemoryRepository::default());
        let llm = ScriptedLlm::new(
            vec![Err(delve_types::llm::LlmError::AuthenticationFailed)],
            REPORT_JSON,
        );
        let pool = ResearchWorkerPool::new(repo.clone(), orchestrator(llm), EventBus::new(64), 1);
        pool.start().await.unwrap();

        let job = ResearchJob::new("Acme", "https://acme.test", AgentVariant::FixedPipeline);
        repo.create(&job).await.unwrap();
        pool.enqueue(job.id).unwrap();

        let done = wait_for_terminal(&repo, job.id).await;
        assert_eq!(done.status, JobStatus::Failed);
        assert_eq!(done.error.as_deref(), Some("authentication failed"));
        assert!(done.result.is_none());
        pool.shutdown().await;
    }

    #[tokio::test]
    async fn cancel_running_job_records_cancellation() {
        let repo = Arc::new(InMemoryRepository::default());
        let pool =
            ResearchWorkerPool::new(repo.clone(), hanging_orchestrator(), EventBus::new(64), 1);
        pool.start().await.unwrap();

        let job = ResearchJob::new("Acme", "https://acme.test", AgentVariant::ToolCalling);
        repo.create(&job).await.unwrap();
        pool.enqueue(job.id).unwrap();

        for _ in 0..200 {
            if repo.get(&job.id).await.unwrap().unwrap().status == JobStatus::InProgress {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        pool.cancel(job.id).await.unwrap();
        let done = wait_for_terminal(&repo, job.id).await;
        assert_eq!(done.status, JobStatus::Failed);
        assert_eq!(done.error.as_deref(), Some("research cancelled"));
        pool.shutdown().await;
    }

    #[tokio::test]
    async fn cancel_pending_job_fails_it_through_in_progress() {
        let repo = Arc::new(InMemoryRepository::default());
        // Workers never started: the job stays queued.
        let pool = ResearchWorkerPool::new(
            repo.clone(),
            orchestrator(ScriptedLlm::new(vec![], REPORT_JSON)),
            EventBus::new(64),
            1,
        );
        let job = ResearchJob::new("Acme", "https://acme.test", AgentVariant::ToolCalling);
        repo.create(&job).await.unwrap();
        pool.enqueue(job.id).unwrap();

        pool.cancel(job.id).await.unwrap();
        let done = repo.get(&job.id).await.unwrap().unwrap();
        assert_eq!(done.status, JobStatus::Failed);
        assert_eq!(done.error.as_deref(), Some("research cancelled"));
        assert!(done.steps.is_empty());

        // A later worker skips it.
        pool.start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        let after = repo.get(&job.id).await.unwrap().unwrap();
        assert_eq!(after.status, JobStatus::Failed);
        assert!(after.steps.is_empty());
        pool.shutdown().await;
    }

    #[tokio::test]
    async fn cancel_terminal_job_is_conflict() {
        let repo = Arc::new(InMemoryRepository::default());
        let pool = ResearchWorkerPool::new(
            repo.clone(),
            orchestrator(ScriptedLlm::new(vec![], REPORT_JSON)),
            EventBus::new(64),
            1,
        );
        let job = ResearchJob::new("Acme", "https://acme.test", AgentVariant::ToolCalling);
        repo.create(&job).await.unwrap();
        repo.mark_started(&job.id).await.unwrap();
        repo.mark_failed(&job.id, "boom").await.unwrap();

        let err = pool.cancel(job.id).await.unwrap_err();
        assert!(matches!(err, JobError::AlreadyFinished(JobStatus::Failed)));
        assert!(matches!(
            pool.cancel(JobId::new()).await.unwrap_err(),
            JobError::NotFound
        ));
    }

    #[tokio::test]
    async fn recovery_fails_stale_and_requeues_pending() {
        let repo = Arc::new(InMemoryRepository::default());
        let stale = ResearchJob::new("Stale", "https://stale.test", AgentVariant::ToolCalling);
        repo.create(&stale).await.unwrap();
        repo.mark_started(&stale.id).await.unwrap();
        let waiting =
            ResearchJob::new("Waiting", "https://waiting.test", AgentVariant::FixedPipeline);
        repo.create(&waiting).await.unwrap();

        let pool = ResearchWorkerPool::new(
            repo.clone(),
            orchestrator(ScriptedLlm::new(vec![], REPORT_JSON)),
            EventBus::new(64),
            1,
        );
        let report = pool.start().await.unwrap();
        assert_eq!(report, RecoveryReport { failed: 1, requeued: 1 });

        let stale_after = repo.get(&stale.id).await.unwrap().unwrap();
        assert_eq!(stale_after.status, JobStatus::Failed);
        assert_eq!(stale_after.error.as_deref(), Some("interrupted by restart"));

        let waiting_after = wait_for_terminal(&repo, waiting.id).await;
        assert_eq!(waiting_after.status, JobStatus::Completed);
        pool.shutdown().await;
    }

    #[tokio::test]
    async fn spawn_workers_skips_recovery() {
        let repo = Arc::new(InMemoryRepository::default());
        let foreign = ResearchJob::new("Other", "https://other.test", AgentVariant::ToolCalling);
        repo.create(&foreign).await.unwrap();
        repo.mark_started(&foreign.id).await.unwrap();

        let pool = ResearchWorkerPool::new(
            repo.clone(),
            orchestrator(ScriptedLlm::new(vec![], REPORT_JSON)),
            EventBus::new(64),
            1,
        );
        pool.spawn_workers().await;

        let job = ResearchJob::new("Acme", "https://acme.test", AgentVariant::FixedPipeline);
        repo.create(&job).await.unwrap();
        pool.enqueue(job.id).unwrap();
        assert_eq!(wait_for_terminal(&repo, job.id).await.status, JobStatus::Completed);

        let untouched = repo.get(&foreign.id).await.unwrap().unwrap();
        assert_eq!(untouched.status, JobStatus::InProgress);
        pool.shutdown().await;
    }

    #[tokio::test]
    async fn shutdown_leaves_running_job_in_progress() {
        let repo = Arc::new(InMemoryRepository::default());
        let pool =
            ResearchWorkerPool::new(repo.clone(), hanging_orchestrator(), EventBus::new(64), 1);
        pool.start().await.unwrap();

        let job = ResearchJob::new("Acme", "https://acme.test", AgentVariant::FixedPipeline);
        repo.create(&job).await.unwrap();
        pool.enqueue(job.id).unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        pool.shutdown().await;
        let after = repo.get(&job.id).await.unwrap().unwrap();
        assert_eq!(after.status, JobStatus::InProgress);
        assert!(!pool.is_tracked(&job.id));
    }
}
