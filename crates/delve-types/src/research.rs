//! Research job types for Delve.
//!
//! A research job is one company-research request and its lifecycle record:
//! identity of the company, which agent variant drives the search phase,
//! the append-only list of progress steps, and the terminal outcome.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::fmt;
use std::str::FromStr;

/// Placeholder used for every year in a fallback report.
pub const FALLBACK_YEAR_PLAN: &str = "Data not available";

/// Placeholder market position used in a fallback report.
pub const FALLBACK_MARKET_POSITION: &str = "Analysis pending";

/// Unique identifier for a research job, wrapping a UUID v7 (time-sortable).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(pub Uuid);

impl JobId {
    /// Create a new JobId using UUID v7.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for JobId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Which search strategy drives a job.
///
/// - ToolCalling: the LLM requests `web_search` calls itself, once per planned query
/// - FixedPipeline: every planned query is searched directly, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AgentVariant {
    ToolCalling,
    FixedPipeline,
}

impl Default for AgentVariant {
    fn default() -> Self {
        AgentVariant::ToolCalling
    }
}

impl fmt::Display for AgentVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgentVariant::ToolCalling => write!(f, "tool-calling"),
            AgentVariant::FixedPipeline => write!(f, "fixed-pipeline"),
        }
    }
}

impl FromStr for AgentVariant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "tool-calling" => Ok(AgentVariant::ToolCalling),
            "fixed-pipeline" => Ok(AgentVariant::FixedPipeline),
            other => Err(format!("invalid agent variant: '{other}'")),
        }
    }
}

/// Lifecycle status of a research job.
///
/// Transitions are monotonic: Pending -> InProgress -> {Completed, Failed}.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl JobStatus {
    /// Completed and Failed are terminal; the record is immutable afterwards.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Pending => write!(f, "pending"),
            JobStatus::InProgress => write!(f, "in-progress"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(JobStatus::Pending),
            "in-progress" => Ok(JobStatus::InProgress),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            other => Err(format!("invalid job status: '{other}'")),
        }
    }
}

/// An immutable progress marker. Order in the job's step list is execution order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchStep {
    pub label: String,
    pub timestamp: DateTime<Utc>,
    pub detail: String,
}

impl ResearchStep {
    pub fn new(label: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            timestamp: Utc::now(),
            detail: detail.into(),
        }
    }
}

/// Five-year AI plan, one entry per year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct YearPlans {
    pub year1: String,
    pub year2: String,
    pub year3: String,
    pub year4: String,
    pub year5: String,
}

impl YearPlans {
    /// All five years set to the same text.
    pub fn uniform(text: &str) -> Self {
        Self {
            year1: text.to_string(),
            year2: text.to_string(),
            year3: text.to_string(),
            year4: text.to_string(),
            year5: text.to_string(),
        }
    }
}

/// Structured outcome of a completed research job.
///
/// This is also the JSON contract the synthesis call is asked to produce.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResearchReport {
    /// Overview of current AI initiatives and projects.
    pub current_initiatives: String,
    /// Expected AI developments for each of the next five years.
    pub year_plans: YearPlans,
    /// Technologies the company uses for AI.
    pub technology_stack: Vec<String>,
    /// AI partnerships and collaborations.
    pub partnerships: Vec<String>,
    /// Overall assessment of the company's position in AI adoption.
    pub market_position: String,
}

impl ResearchReport {
    /// Deterministic substitute used when the synthesis output cannot be parsed.
    pub fn fallback(raw_response: &str) -> Self {
        Self {
            current_initiatives: raw_response.to_string(),
            year_plans: YearPlans::uniform(FALLBACK_YEAR_PLAN),
            technology_stack: Vec::new(),
            partnerships: Vec::new(),
            market_position: FALLBACK_MARKET_POSITION.to_string(),
        }
    }
}

/// A company research job and its full lifecycle record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResearchJob {
    pub id: JobId,
    pub company_name: String,
    pub company_website: String,
    pub agent_variant: AgentVariant,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub steps: Vec<ResearchStep>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ResearchReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ResearchJob {
    /// A freshly created job: pending, no steps, no outcome.
    pub fn new(
        company_name: impl Into<String>,
        company_website: impl Into<String>,
        agent_variant: AgentVariant,
    ) -> Self {
        Self {
            id: JobId::new(),
            company_name: company_name.into(),
            company_website: company_website.into(),
            agent_variant,
            status: JobStatus::Pending,
            created_at: Utc::now(),
            completed_at: None,
            steps: Vec::new(),
            result: None,
            error: None,
        }
    }
}

/// Request body for creating a research job.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateResearchRequest {
    #[serde(default)]
    pub company_name: Option<String>,
    #[serde(default)]
    pub company_website: Option<String>,
    #[serde(default)]
    pub agent_variant: Option<AgentVariant>,
}

/// Progress notifications fanned out to live observers of a job.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResearchEvent {
    /// A step was appended to the job.
    Step { job_id: JobId, step: ResearchStep },
    /// The job reached a terminal status.
    Finished {
        job_id: JobId,
        status: JobStatus,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
}

impl ResearchEvent {
    pub fn job_id(&self) -> JobId {
        match self {
            ResearchEvent::Step { job_id, .. } | ResearchEvent::Finished { job_id, .. } => *job_id,
        }
    }
}
