//! SQLite research job repository.
//!
//! Implements `ResearchRepository` from `delve-core`. Jobs live in
//! `research_jobs`; steps live in `research_steps` keyed by `(job_id, seq)`
//! so appends never rewrite earlier steps. Status changes are conditional
//! UPDATEs on the current status.

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::Row;

use delve_core::repository::SortOrder;
use delve_core::repository::research::{JobFilter, ResearchRepository};
use delve_types::error::RepositoryError;
use delve_types::research::{
    AgentVariant, JobId, JobStatus, ResearchJob, ResearchReport, ResearchStep,
};

use super::pool::DatabasePool;

/// SQLite-backed implementation of `ResearchRepository`.
pub struct SqliteResearchRepository {
    pool: DatabasePool,
}

impl SqliteResearchRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    async fn load_steps(&self, id: &str) -> Result<Vec<ResearchStep>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT label, detail, timestamp FROM research_steps WHERE job_id = ? ORDER BY seq",
        )
        .bind(id)
        .fetch_all(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        rows.iter()
            .map(|row| {
                let label: String = row.try_get("label").map_err(query_err)?;
                let detail: String = row.try_get("detail").map_err(query_err)?;
                let timestamp: String = row.try_get("timestamp").map_err(query_err)?;
                Ok(ResearchStep {
                    label,
                    detail,
                    timestamp: parse_datetime(&timestamp)?,
                })
            })
            .collect()
    }

    async fn current_status(&self, id: &JobId) -> Result<Option<JobStatus>, RepositoryError> {
        let status: Option<String> =
            sqlx::query_scalar("SELECT status FROM research_jobs WHERE id = ?")
                .bind(id.to_string())
                .fetch_optional(&self.pool.writer)
                .await
                .map_err(query_err)?;
        status
            .map(|s| s.parse::<JobStatus>().map_err(RepositoryError::Query))
            .transpose()
    }

    /// Explain why a conditional UPDATE touched no rows.
    async fn rejected(&self, id: &JobId, from: JobStatus, to: JobStatus) -> RepositoryError {
        match self.current_status(id).await {
            Ok(Some(_)) => RepositoryError::StaleStatus { from, to },
            Ok(None) => RepositoryError::NotFound,
            Err(e) => e,
        }
    }
}

/// Internal row type for mapping SQLite rows to a domain job.
struct JobRow {
    id: String,
    company_name: String,
    company_website: String,
    agent_variant: String,
    status: String,
    created_at: String,
    completed_at: Option<String>,
    result: Option<String>,
    error: Option<String>,
}

impl JobRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            company_name: row.try_get("company_name")?,
            company_website: row.try_get("company_website")?,
            agent_variant: row.try_get("agent_variant")?,
            status: row.try_get("status")?,
            created_at: row.try_get("created_at")?,
            completed_at: row.try_get("completed_at")?,
            result: row.try_get("result")?,
            error: row.try_get("error")?,
        })
    }

    fn into_job(self, steps: Vec<ResearchStep>) -> Result<ResearchJob, RepositoryError> {
        let id = self
            .id
            .parse::<JobId>()
            .map_err(|e| RepositoryError::Query(format!("invalid job id: {e}")))?;
        let agent_variant: AgentVariant =
            self.agent_variant.parse().map_err(RepositoryError::Query)?;
        let status: JobStatus = self.status.parse().map_err(RepositoryError::Query)?;
        let result = self
            .result
            .as_deref()
            .map(serde_json::from_str::<ResearchReport>)
            .transpose()
            .map_err(|e| RepositoryError::Query(format!("invalid report JSON: {e}")))?;

        Ok(ResearchJob {
            id,
            company_name: self.company_name,
            company_website: self.company_website,
            agent_variant,
            status,
            created_at: parse_datetime(&self.created_at)?,
            completed_at: self
                .completed_at
                .as_deref()
                .map(parse_datetime)
                .transpose()?,
            steps,
            result,
            error: self.error,
        })
    }
}

fn query_err(e: sqlx::Error) -> RepositoryError {
    RepositoryError::Query(e.to_string())
}

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Query(format!("invalid datetime: {e}")))
}

/// Fixed-width UTC timestamps so text order equals time order.
fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

impl ResearchRepository for SqliteResearchRepository {
    async fn create(&self, job: &ResearchJob) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "INSERT INTO research_jobs (id, company_name, company_website, agent_variant, status, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(job.id.to_string())
        .bind(&job.company_name)
        .bind(&job.company_website)
        .bind(job.agent_variant.to_string())
        .bind(job.status.to_string())
        .bind(format_datetime(&job.created_at))
        .execute(&self.pool.writer)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db_err)) if db_err.message().contains("UNIQUE") => Err(
                RepositoryError::Conflict(format!("research job '{}' already exists", job.id)),
            ),
            Err(e) => Err(query_err(e)),
        }
    }

    async fn get(&self, id: &JobId) -> Result<Option<ResearchJob>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM research_jobs WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(query_err)?;

        match row {
            Some(row) => {
                let job_row = JobRow::from_row(&row).map_err(query_err)?;
                let steps = self.load_steps(&job_row.id).await?;
                Ok(Some(job_row.into_job(steps)?))
            }
            None => Ok(None),
        }
    }

    async fn list(&self, filter: JobFilter) -> Result<Vec<ResearchJob>, RepositoryError> {
        let order = match filter.sort_order.unwrap_or_default() {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        };
        let sql = format!(
            "SELECT * FROM research_jobs
             WHERE (?1 IS NULL OR status = ?1) AND (?2 IS NULL OR agent_variant = ?2)
             ORDER BY created_at {order}, id {order}
             LIMIT ?3"
        );

        let rows = sqlx::query(&sql)
            .bind(filter.status.map(|s| s.to_string()))
            .bind(filter.agent_variant.map(|v| v.to_string()))
            .bind(filter.limit.unwrap_or(-1))
            .fetch_all(&self.pool.reader)
            .await
            .map_err(query_err)?;

        let mut jobs = Vec::with_capacity(rows.len());
        for row in &rows {
            let job_row = JobRow::from_row(row).map_err(query_err)?;
            let steps = self.load_steps(&job_row.id).await?;
            jobs.push(job_row.into_job(steps)?);
        }
        Ok(jobs)
    }

    async fn append_step(&self, id: &JobId, step: &ResearchStep) -> Result<(), RepositoryError> {
        let job_id = id.to_string();
        let result = sqlx::query(
            "INSERT INTO research_steps (job_id, seq, label, detail, timestamp)
             SELECT ?1,
                    (SELECT COALESCE(MAX(seq), 0) + 1 FROM research_steps WHERE job_id = ?1),
                    ?2, ?3, ?4
             WHERE EXISTS (
                 SELECT 1 FROM research_jobs
                 WHERE id = ?1 AND status IN ('pending', 'in-progress')
             )",
        )
        .bind(&job_id)
        .bind(&step.label)
        .bind(&step.detail)
        .bind(format_datetime(&step.timestamp))
        .execute(&self.pool.writer)
        .await
        .map_err(query_err)?;

        if result.rows_affected() == 0 {
            return match self.current_status(id).await? {
                Some(status) => Err(RepositoryError::Conflict(format!(
                    "research job is {status}; steps are closed"
                ))),
                None => Err(RepositoryError::NotFound),
            };
        }
        Ok(())
    }

    async fn mark_started(&self, id: &JobId) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE research_jobs SET status = ? WHERE id = ? AND status = ?")
            .bind(JobStatus::InProgress.to_string())
            .bind(id.to_string())
            .bind(JobStatus::Pending.to_string())
            .execute(&self.pool.writer)
            .await
            .map_err(query_err)?;

        if result.rows_affected() == 0 {
            return Err(self
                .rejected(id, JobStatus::Pending, JobStatus::InProgress)
                .await);
        }
        Ok(())
    }

    async fn mark_completed(
        &self,
        id: &JobId,
        report: &ResearchReport,
    ) -> Result<(), RepositoryError> {
        let report_json =
            serde_json::to_string(report).map_err(|e| RepositoryError::Query(e.to_string()))?;

        let result = sqlx::query(
            "UPDATE research_jobs SET status = ?, result = ?, completed_at = ?
             WHERE id = ? AND status = ?",
        )
        .bind(JobStatus::Completed.to_string())
        .bind(&report_json)
        .bind(format_datetime(&Utc::now()))
        .bind(id.to_string())
        .bind(JobStatus::InProgress.to_string())
        .execute(&self.pool.writer)
        .await
        .map_err(query_err)?;

        if result.rows_affected() == 0 {
            return Err(self
                .rejected(id, JobStatus::InProgress, JobStatus::Completed)
                .await);
        }
        Ok(())
    }

    async fn mark_failed(&self, id: &JobId, error: &str) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE research_jobs SET status = ?, error = ?, completed_at = ?
             WHERE id = ? AND status = ?",
        )
        .bind(JobStatus::Failed.to_string())
        .bind(error)
        .bind(format_datetime(&Utc::now()))
        .bind(id.to_string())
        .bind(JobStatus::InProgress.to_string())
        .execute(&self.pool.writer)
        .await
        .map_err(query_err)?;

        if result.rows_affected() == 0 {
            return Err(self
                .rejected(id, JobStatus::InProgress, JobStatus::Failed)
                .await);
        }
        Ok(())
    }
}
