//! Query plans for each agent variant.

use delve_types::research::AgentVariant;

const TOOL_CALLING_TEMPLATES: [&str; 5] = [
    "AI initiatives current projects",
    "artificial intelligence strategy roadmap",
    "AI technology stack tools",
    "AI partnerships collaborations",
    "AI future plans 2025-2030",
];

const FIXED_PIPELINE_TEMPLATES: [&str; 4] = [
    "AI initiatives current projects",
    "artificial intelligence strategy roadmap",
    "AI technology stack tools partnerships",
    "AI plans future 2025-2030",
];

/// The ordered search queries for `company` under `variant`.
pub fn plan_queries(variant: AgentVariant, company: &str) -> Vec<String> {
    let templates: &[&str] = match variant {
        AgentVariant::ToolCalling => &TOOL_CALLING_TEMPLATES,
        AgentVariant::FixedPipeline => &FIXED_PIPELINE_TEMPLATES,
    };
    templates.iter().map(|t| format!("{company} {t}")).collect()
}
