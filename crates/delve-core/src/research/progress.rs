//! Progress sinks: where research steps go as they happen.

use std::sync::Arc;

use delve_types::research::{JobId, ResearchEvent, ResearchStep};

use crate::event::EventBus;
use crate::repository::research::ResearchRepository;

/// Receives each step right after it happens.
///
/// Recording is fire-and-forget: a sink never fails the workflow.
pub trait ProgressSink: Send + Sync {
    fn record(&self, step: ResearchStep) -> impl std::future::Future<Output = ()> + Send;
}

/// Appends steps to the job record and broadcasts them on the event bus.
pub struct RepositorySink<R: ResearchRepository> {
    repo: Arc<R>,
    bus: EventBus,
    job_id: JobId,
}

impl<R: ResearchRepository> RepositorySink<R> {
    pub fn new(repo: Arc<R>, bus: EventBus, job_id: JobId) -> Self {
        Self { repo, bus, job_id }
    }
}

impl<R: ResearchRepository> ProgressSink for RepositorySink<R> {
    async fn record(&self, step: ResearchStep) {
        if let Err(e) = self.repo.append_step(&self.job_id, &step).await {
            tracing::warn!(job_id = %self.job_id, label = %step.label, error = %e, "failed to persist research step");
        }
        self.bus.publish(ResearchEvent::Step {
            job_id: self.job_id,
            step,
        });
    }
}
