//! Research job repository trait definition.

use delve_types::error::RepositoryError;
use delve_types::research::{
    AgentVariant, JobId, JobStatus, ResearchJob, ResearchReport, ResearchStep,
};

use super::SortOrder;

/// Filter criteria for listing research jobs.
#[derive(Debug, Clone, Default)]
pub struct JobFilter {
    pub status: Option<JobStatus>,
    pub agent_variant: Option<AgentVariant>,
    /// Creation-time order; newest first when unset.
    pub sort_order: Option<SortOrder>,
    pub limit: Option<i64>,
}

/// Repository trait for research job persistence.
///
/// Status changes are compare-and-set: each transition names the status the
/// job must currently hold and fails with `RepositoryError::StaleStatus`
/// when it does not, so terminal records are never overwritten.
pub trait ResearchRepository: Send + Sync {
    /// Insert a new job (normally pending with no steps).
    fn create(
        &self,
        job: &ResearchJob,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Get a job with its steps in execution order.
    fn get(
        &self,
        id: &JobId,
    ) -> impl std::future::Future<Output = Result<Option<ResearchJob>, RepositoryError>> + Send;

    /// List jobs matching the filter, including their steps.
    fn list(
        &self,
        filter: JobFilter,
    ) -> impl std::future::Future<Output = Result<Vec<ResearchJob>, RepositoryError>> + Send;

    /// Append one step to the end of the job's step list.
    fn append_step(
        &self,
        id: &JobId,
        step: &ResearchStep,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// pending -> in-progress.
    fn mark_started(
        &self,
        id: &JobId,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// in-progress -> completed, storing the report and completion time.
    fn mark_completed(
        &self,
        id: &JobId,
        report: &ResearchReport,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// in-progress -> failed, storing the error message and completion time.
    fn mark_failed(
        &self,
        id: &JobId,
        error: &str,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;
}
