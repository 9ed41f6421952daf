use thiserror::Error;

use crate::llm::LlmError;
use crate::research::JobStatus;

/// Errors related to research job operations.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("research job not found")]
    NotFound,

    #[error("{0}")]
    Validation(String),

    #[error("invalid status transition: {from} -> {to}")]
    InvalidTransition { from: JobStatus, to: JobStatus },

    #[error("research job already finished with status '{0}'")]
    AlreadyFinished(JobStatus),

    #[error("research queue is closed")]
    QueueClosed,

    #[error("storage error: {0}")]
    StorageError(String),
}

impl From<RepositoryError> for JobError {
    fn from(e: RepositoryError) -> Self {
        match e {
            RepositoryError::NotFound => JobError::NotFound,
            RepositoryError::StaleStatus { from, to } => JobError::InvalidTransition { from, to },
            other => JobError::StorageError(other.to_string()),
        }
    }
}

/// Errors that abort a research workflow. The message is recorded verbatim
/// on the failed job.
#[derive(Debug, Error)]
pub enum ResearchError {
    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error("failed to parse research results")]
    Parse,

    #[error("failed to serialize search results: {0}")]
    Serialization(String),

    #[error("research cancelled")]
    Cancelled,
}

/// Errors from repository operations (used by trait definitions in delve-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("entity not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),

    /// A status compare-and-set lost: the record was not in the expected status.
    #[error("status transition {from} -> {to} rejected")]
    StaleStatus { from: JobStatus, to: JobStatus },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repository_error_display() {
        let err = RepositoryError::Query("syntax error".to_string());
        assert_eq!(err.to_string(), "query error: syntax error");
    }

    #[test]
    fn test_research_error_keeps_llm_message() {
        let err = ResearchError::from(LlmError::AuthenticationFailed);
        assert_eq!(err.to_string(), "authentication failed");
        assert_eq!(ResearchError::Cancelled.to_string(), "research cancelled");
    }

    #[test]
    fn test_job_error_from_repository() {
        assert!(matches!(
            JobError::from(RepositoryError::NotFound),
            JobError::NotFound
        ));
        let err = JobError::from(RepositoryError::StaleStatus {
            from: JobStatus::Pending,
            to: JobStatus::Completed,
        });
        assert_eq!(
            err.to_string(),
            "invalid status transition: pending -> completed"
        );
    }
}
