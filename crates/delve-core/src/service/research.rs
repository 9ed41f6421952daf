//! Research job service: validation, creation, lookup, listing, cancel.

use std::sync::Arc;

use delve_types::error::JobError;
use delve_types::research::{
    AgentVariant, CreateResearchRequest, JobId, JobStatus, ResearchJob,
};

use crate::repository::SortOrder;
use crate::repository::research::{JobFilter, ResearchRepository};
use crate::research::worker::ResearchWorkerPool;

/// Message returned alongside a newly created job.
pub const RESEARCH_STARTED: &str = "Research started";

/// Service over the job store and the worker pool.
///
/// Generic over the repository so delve-core never depends on delve-infra.
pub struct ResearchService<R: ResearchRepository + 'static> {
    repo: Arc<R>,
    pool: Arc<ResearchWorkerPool<R>>,
    list_limit: i64,
}

impl<R: ResearchRepository + 'static> ResearchService<R> {
    pub fn new(repo: Arc<R>, pool: Arc<ResearchWorkerPool<R>>, list_limit: i64) -> Self {
        Self {
            repo,
            pool,
            list_limit,
        }
    }

    /// Validate the request, persist a pending job, and queue it.
    pub async fn create(&self, request: CreateResearchRequest) -> Result<ResearchJob, JobError> {
        let name = required(request.company_name.as_deref());
        let website = required(request.company_website.as_deref());
        let (Some(name), Some(website)) = (name, website) else {
            return Err(JobError::Validation(
                "Company name and website are required".to_string(),
            ));
        };

        let variant = request.agent_variant.unwrap_or_default();
        let job = ResearchJob::new(name, website, variant);
        self.repo.create(&job).await?;
        self.pool.enqueue(job.id)?;

        tracing::info!(job_id = %job.id, company = %job.company_name, %variant, "research job created");
        Ok(job)
    }

    /// Fetch a job by its textual id. Malformed ids are reported as not found.
    pub async fn get(&self, id: &str) -> Result<ResearchJob, JobError> {
        let id = parse_id(id)?;
        self.repo.get(&id).await?.ok_or(JobError::NotFound)
    }

    /// Newest jobs first, capped at the configured list limit.
    pub async fn list(
        &self,
        status: Option<JobStatus>,
        agent_variant: Option<AgentVariant>,
    ) -> Result<Vec<ResearchJob>, JobError> {
        let jobs = self
            .repo
            .list(JobFilter {
                status,
                agent_variant,
                sort_order: Some(SortOrder::Desc),
                limit: Some(self.list_limit),
            })
            .await?;
        Ok(jobs)
    }

    /// Cancel a pending or in-progress job; returns its record afterwards.
    pub async fn cancel(&self, id: &str) -> Result<ResearchJob, JobError> {
        let id = parse_id(id)?;
        self.pool.cancel(id).await?;
        self.repo.get(&id).await?.ok_or(JobError::NotFound)
    }
}

fn required(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn parse_id(id: &str) -> Result<JobId, JobError> {
    id.trim().parse::<JobId>().map_err(|_| JobError::NotFound)
}
