//! Tool-calling loop: let the model drive `web_search` calls.
//!
//! The conversation starts from a single user message with the `web_search`
//! tool declared. While the model stops for `tool_use`, the first tool call
//! of the turn is answered and the model is invoked again. The loop ends on
//! the first turn that does not request a tool, or after
//! `max_iterations` provider calls.

use delve_types::llm::{
    CompletionRequest, ContentBlock, LlmError, Message, MessageContent, StopReason,
    ToolDefinition,
};
use delve_types::search::QueryResults;

use crate::llm::box_provider::BoxLlmProvider;
use crate::llm::instrumented_complete;
use crate::search::box_provider::BoxSearchProvider;

pub const WEB_SEARCH_TOOL: &str = "web_search";

/// Declaration of the `web_search` tool.
pub fn web_search_tool() -> ToolDefinition {
    ToolDefinition {
        name: WEB_SEARCH_TOOL.to_string(),
        description: "Search the web for information about companies, AI initiatives, \
                      and technology trends. Returns relevant search results."
            .to_string(),
        input_schema: serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The search query to execute"
                }
            },
            "required": ["query"]
        }),
    }
}

/// Request parameters shared by every turn of the loop.
#[derive(Debug, Clone)]
pub struct ToolLoopSettings {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: Option<f64>,
    pub max_iterations: usize,
}

/// Run the loop for one opening prompt and return every honored search, in
/// call order.
pub async fn run_tool_loop(
    llm: &BoxLlmProvider,
    search: &BoxSearchProvider,
    settings: &ToolLoopSettings,
    prompt: &str,
) -> Result<Vec<QueryResults>, LlmError> {
    let tools = vec![web_search_tool()];
    let mut messages = vec![Message::user(prompt)];
    let mut gathered = Vec::new();

    for iteration in 0..settings.max_iterations {
        let mut request =
            CompletionRequest::new(&settings.model, messages.clone(), settings.max_tokens);
        request.temperature = settings.temperature;
        request.tools = tools.clone();

        let response = instrumented_complete(llm, &request).await?;
        if response.stop_reason != StopReason::ToolUse {
            return Ok(gathered);
        }
        let Some((tool_use_id, name, input)) = response.first_tool_use() else {
            tracing::warn!(iteration, "tool_use stop without a tool_use block");
            return Ok(gathered);
        };

        messages.push(Message::assistant(MessageContent::Blocks(
            response.blocks.clone(),
        )));

        let mut answers = Vec::new();
        match (name, input.get("query").and_then(|q| q.as_str())) {
            (WEB_SEARCH_TOOL, Some(query)) => {
                let results = search.search(query).await;
                let content = serde_json::to_string(&results)
                    .map_err(|e| LlmError::Deserialization(e.to_string()))?;
                tracing::debug!(query, count = results.len(), "tool search executed");
                gathered.push(QueryResults {
                    query: query.to_string(),
                    results,
                });
                answers.push(tool_result(tool_use_id, content, false));
            }
            (WEB_SEARCH_TOOL, None) => {
                answers.push(tool_result(
                    tool_use_id,
                    "missing required parameter: query".to_string(),
                    true,
                ));
            }
            (other, _) => {
                tracing::warn!(tool = other, "model requested an unknown tool");
                answers.push(tool_result(tool_use_id, format!("unknown tool: {other}"), true));
            }
        }

        // Only the first call of a turn runs; the rest still need an answer.
        for block in response.blocks.iter().skip_while(|b| !is_tool_use(b)).skip(1) {
            if let ContentBlock::ToolUse { id, .. } = block {
                answers.push(tool_result(
                    id,
                    "not executed: one tool call per turn".to_string(),
                    true,
                ));
            }
        }
        messages.push(Message::user(MessageContent::Blocks(answers)));
    }

    tracing::warn!(
        max_iterations = settings.max_iterations,
        searches = gathered.len(),
        "tool loop hit iteration limit, keeping results gathered so far"
    );
    Ok(gathered)
}

fn is_tool_use(block: &ContentBlock) -> bool {
    matches!(block, ContentBlock::ToolUse { .. })
}

fn tool_result(tool_use_id: &str, content: String, is_error: bool) -> ContentBlock {
    ContentBlock::ToolResult {
        tool_use_id: tool_use_id.to_string(),
        content,
        is_error: is_error.then_some(true),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ScriptedLlm, StaticSearch, text_response, tool_use_response};
    use delve_types::llm::CompletionResponse;
    use serde_json::json;

    fn settings(max_iterations: usize) -> ToolLoopSettings {
        ToolLoopSettings {
            model: "mock-model".to_string(),
            max_tokens: 4096,
            temperature: None,
            max_iterations,
        }
    }

    struct Harness {
        llm: ScriptedLlm,
        search: StaticSearch,
        boxed_llm: BoxLlmProvider,
        boxed_search: BoxSearchProvider,
    }

    fn harness(script: Vec<Result<CompletionResponse, LlmError>>) -> Harness {
        let llm = ScriptedLlm::new(script, "done");
        let search = StaticSearch::new(2);
        Harness {
            boxed_llm: BoxLlmProvider::new(llm.clone()),
            boxed_search: BoxSearchProvider::new(search.clone()),
            llm,
            search,
        }
    }

    #[tokio::test]
    async fn no_tool_call_returns_empty() {
        let h = harness(vec![Ok(text_response("nothing to search"))]);
        let gathered = run_tool_loop(&h.boxed_llm, &h.boxed_search, &settings(8), "prompt")
            .await
            .unwrap();
        assert!(gathered.is_empty());
        assert_eq!(h.llm.request_count(), 1);

        let requests = h.llm.requests.lock().unwrap();
        assert_eq!(requests[0].tools.len(), 1);
        assert_eq!(requests[0].tools[0].name, "web_search");
        assert_eq!(requests[0].messages[0].content.text(), "prompt");
    }

    #[tokio::test]
    async fn answers_tool_calls_until_end_turn() {
        let h = harness(vec![
            Ok(tool_use_response(&[("t1", "web_search", json!({"query": "q one"}))])),
            Ok(tool_use_response(&[("t2", "web_search", json!({"query": "q two"}))])),
            Ok(text_response("summary")),
        ]);
        let gathered = run_tool_loop(&h.boxed_llm, &h.boxed_search, &settings(8), "prompt")
            .await
            .unwrap();

        assert_eq!(gathered.len(), 2);
        assert_eq!(gathered[0].query, "q one");
        assert_eq!(gathered[1].query, "q two");
        assert_eq!(gathered[0].results.len(), 2);
        assert_eq!(*h.search.queries.lock().unwrap(), vec!["q one", "q two"]);

        // Third request carries: user, assistant(tool_use), user(tool_result) x2.
        let requests = h.llm.requests.lock().unwrap();
        let last = &requests[2].messages;
        assert_eq!(last.len(), 5);
        match &last[2].content {
            MessageContent::Blocks(blocks) => match &blocks[0] {
                ContentBlock::ToolResult {
                    tool_use_id,
                    content,
                    is_error,
                } => {
                    assert_eq!(tool_use_id, "t1");
                    assert!(content.contains("q one #0"));
                    assert!(is_error.is_none());
                }
                other => panic!("unexpected block: {other:?}"),
            },
            other => panic!("unexpected content: {other:?}"),
        }
    }

    #[tokio::test]
    async fn only_first_tool_call_of_a_turn_runs() {
        let h = harness(vec![
            Ok(tool_use_response(&[
                ("a", "web_search", json!({"query": "first"})),
                ("b", "web_search", json!({"query": "second"})),
            ])),
            Ok(text_response("ok")),
        ]);
        let gathered = run_tool_loop(&h.boxed_llm, &h.boxed_search, &settings(8), "prompt")
            .await
            .unwrap();

        assert_eq!(gathered.len(), 1);
        assert_eq!(gathered[0].query, "first");
        assert_eq!(*h.search.queries.lock().unwrap(), vec!["first"]);

        let requests = h.llm.requests.lock().unwrap();
        let MessageContent::Blocks(answers) = &requests[1].messages[2].content else {
            panic!("expected tool results");
        };
        assert_eq!(answers.len(), 2);
        assert!(matches!(
            &answers[1],
            ContentBlock::ToolResult { tool_use_id, is_error: Some(true), .. } if tool_use_id == "b"
        ));
    }

    #[tokio::test]
    async fn unknown_tool_gets_error_result() {
        let h = harness(vec![
            Ok(tool_use_response(&[("x", "fetch_page", json!({"url": "u"}))])),
            Ok(tool_use_response(&[("y", "web_search", json!({}))])),
            Ok(text_response("ok")),
        ]);
        let gathered = run_tool_loop(&h.boxed_llm, &h.boxed_search, &settings(8), "prompt")
            .await
            .unwrap();

        assert!(gathered.is_empty());
        assert!(h.search.queries.lock().unwrap().is_empty());
        let requests = h.llm.requests.lock().unwrap();
        let MessageContent::Blocks(answer) = &requests[1].messages[2].content else {
            panic!("expected tool result");
        };
        assert!(matches!(
            &answer[0],
            ContentBlock::ToolResult { content, is_error: Some(true), .. }
                if content == "unknown tool: fetch_page"
        ));
    }

    #[tokio::test]
    async fn stops_at_iteration_limit_keeping_results() {
        let script = (0..10)
            .map(|i| {
                Ok(tool_use_response(&[(
                    "t",
                    "web_search",
                    json!({"query": format!("q{i}")}),
                )]))
            })
            .collect();
        let h = harness(script);
        let gathered = run_tool_loop(&h.boxed_llm, &h.boxed_search, &settings(3), "prompt")
            .await
            .unwrap();

        assert_eq!(h.llm.request_count(), 3);
        assert_eq!(gathered.len(), 3);
        assert_eq!(gathered[2].query, "q2");
    }

    #[tokio::test]
    async fn provider_error_propagates() {
        let h = harness(vec![Err(LlmError::AuthenticationFailed)]);
        let err = run_tool_loop(&h.boxed_llm, &h.boxed_search, &settings(8), "prompt")
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::AuthenticationFailed));
    }
}
