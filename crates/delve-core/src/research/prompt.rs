//! Prompt construction for the research workflow.

use delve_types::error::ResearchError;
use delve_types::research::ResearchReport;
use delve_types::search::QueryResults;

/// User message that opens the tool-calling conversation for one query.
pub fn tool_search_prompt(query: &str) -> String {
    format!("Search for information about: {query}")
}

/// JSON schema of the report, pretty-printed.
pub fn report_schema() -> String {
    let schema = schemars::schema_for!(ResearchReport);
    serde_json::to_string_pretty(&schema).unwrap_or_default()
}

/// The single synthesis prompt turning gathered results into a report.
pub fn synthesis_prompt(
    company_name: &str,
    company_website: &str,
    results: &[QueryResults],
) -> Result<String, ResearchError> {
    let results_json = serde_json::to_string_pretty(results)
        .map_err(|e| ResearchError::Serialization(e.to_string()))?;
    let schema = report_schema();

    Ok(format!(
        r#"You are a research analyst covering AI and technology strategy. Using the search results below, write an analysis of {company_name}'s AI adoption.

Company: {company_name}
Website: {company_website}

Search Results:
{results_json}

Respond with a single JSON object of this shape:
{{
  "currentInitiatives": "overview of current AI initiatives and projects (2-3 paragraphs)",
  "yearPlans": {{
    "year1": "expected AI developments over the next 12 months",
    "year2": "expected AI developments in year 2",
    "year3": "expected AI developments in year 3",
    "year4": "expected AI developments in year 4",
    "year5": "expected AI developments in year 5"
  }},
  "technologyStack": ["technology", "..."],
  "partnerships": ["partnership", "..."],
  "marketPosition": "overall assessment of the company's position in AI adoption and innovation"
}}

The object must validate against this JSON schema:
{schema}

Where the results are thin, make reasonable inferences from the company's industry and known activities."#
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use delve_types::search::SearchResult;

    #[test]
    fn tool_prompt_wording() {
        assert_eq!(
            tool_search_prompt("Acme AI partnerships collaborations"),
            "Search for information about: Acme AI partnerships collaborations"
        );
    }

    #[test]
    fn schema_names_every_report_field() {
        let schema = report_schema();
        for key in [
            "currentInitiatives",
            "yearPlans",
            "technologyStack",
            "partnerships",
            "marketPosition",
            "year5",
        ] {
            assert!(schema.contains(key), "schema missing {key}");
        }
    }

    #[test]
    fn synthesis_prompt_embeds_company_and_results() {
        let results = vec![QueryResults {
            query: "Acme AI initiatives current projects".to_string(),
            results: vec![SearchResult {
                title: "Acme launches copilot".to_string(),
                snippet: "A new assistant".to_string(),
                url: "https://acme.test/news".to_string(),
            }],
        }];
        let prompt = synthesis_prompt("Acme", "https://acme.test", &results).unwrap();
        assert!(prompt.contains("Company: Acme"));
        assert!(prompt.contains("Website: https://acme.test"));
        assert!(prompt.contains("\"query\": \"Acme AI initiatives current projects\""));
        assert!(prompt.contains("Acme launches copilot"));
        assert!(prompt.contains("\"marketPosition\""));
    }

    #[test]
    fn synthesis_prompt_with_no_results() {
        let prompt = synthesis_prompt("Acme", "https://acme.test", &[]).unwrap();
        assert!(prompt.contains("Search Results:\n[]"));
    }
}
