//! Structured-output extraction from the synthesis response.

use delve_types::config::ParseFailurePolicy;
use delve_types::error::ResearchError;
use delve_types::research::ResearchReport;

/// The span from the first `{` to the last `}` inclusive, if both exist in
/// that order.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// Parse the synthesis text into a report.
///
/// When no object is found, or the object does not match the report shape,
/// the policy decides: `Fallback` yields [`ResearchReport::fallback`] built
/// from the raw text, `Fail` yields [`ResearchError::Parse`].
pub fn parse_report(
    text: &str,
    policy: ParseFailurePolicy,
) -> Result<ResearchReport, ResearchError> {
    let parsed = match extract_json_object(text) {
        Some(candidate) => serde_json::from_str::<ResearchReport>(candidate).map_err(|e| {
            tracing::warn!(error = %e, "synthesis output did not match the report shape");
        }),
        None => {
            tracing::warn!("synthesis output contained no JSON object");
            Err(())
        }
    };

    match (parsed, policy) {
        (Ok(report), _) => Ok(report),
        (Err(()), ParseFailurePolicy::Fallback) => Ok(ResearchReport::fallback(text)),
        (Err(()), ParseFailurePolicy::Fail) => Err(ResearchError::Parse),
    }
}
