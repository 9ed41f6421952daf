//! Query parameter extractors for list endpoints.

use serde::Deserialize;

use delve_types::research::{AgentVariant, JobStatus};

use crate::http::error::AppError;

/// Query parameters for the research list endpoint.
#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ResearchListQuery {
    /// Filter by status (pending, in-progress, completed, failed).
    pub status: Option<String>,
    /// Filter by agent variant (tool-calling, fixed-pipeline).
    pub agent_variant: Option<String>,
}

impl ResearchListQuery {
    /// Parse the filters. Unknown values are validation errors; empty
    /// values mean no filter.
    pub fn filters(&self) -> Result<(Option<JobStatus>, Option<AgentVariant>), AppError> {
        let status = non_empty(&self.status)
            .map(|s| s.parse::<JobStatus>().map_err(AppError::Validation))
            .transpose()?;
        let variant = non_empty(&self.agent_variant)
            .map(|v| v.parse::<AgentVariant>().map_err(AppError::Validation))
            .transpose()?;
        Ok((status, variant))
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_filters() {
        let query = ResearchListQuery {
            status: Some("in-progress".to_string()),
            agent_variant: Some("fixed-pipeline".to_string()),
        };
        let (status, variant) = query.filters().unwrap();
        assert_eq!(status, Some(JobStatus::InProgress));
        assert_eq!(variant, Some(AgentVariant::FixedPipeline));
    }

    #[test]
    fn empty_filters_are_ignored() {
        let query = ResearchListQuery {
            status: Some(String::new()),
            agent_variant: None,
        };
        assert_eq!(query.filters().unwrap(), (None, None));
    }

    #[test]
    fn unknown_filter_is_validation_error() {
        let query = ResearchListQuery {
            status: Some("done".to_string()),
            agent_variant: None,
        };
        assert!(matches!(query.filters(), Err(AppError::Validation(_))));
    }
}
