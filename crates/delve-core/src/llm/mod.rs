//! LLM provider abstractions for Delve.
//!
//! - `LlmProvider`: RPITIT trait for concrete provider implementations
//! - `BoxLlmProvider`: object-safe wrapper for dynamic dispatch
//! - `instrumented_complete`: a completion call wrapped in a `gen_ai` span

pub mod box_provider;
pub mod provider;

use tracing::Instrument;

use delve_types::llm::{CompletionRequest, CompletionResponse, LlmError};

use box_provider::BoxLlmProvider;

/// Run a non-streaming completion inside a `gen_ai.complete` span and record
/// token usage on success.
pub async fn instrumented_complete(
    provider: &BoxLlmProvider,
    request: &CompletionRequest,
) -> Result<CompletionResponse, LlmError> {
    let span = tracing::info_span!(
        "gen_ai.complete",
        gen_ai.system = provider.name(),
        gen_ai.request.model = %request.model,
        gen_ai.request.max_tokens = request.max_tokens,
        gen_ai.request.tools = request.tools.len(),
        gen_ai.usage.input_tokens = tracing::field::Empty,
        gen_ai.usage.output_tokens = tracing::field::Empty,
    );

    async {
        let response = provider.complete(request).await?;
        let current = tracing::Span::current();
        current.record("gen_ai.usage.input_tokens", response.usage.input_tokens);
        current.record("gen_ai.usage.output_tokens", response.usage.output_tokens);
        tracing::debug!(stop_reason = %response.stop_reason, "completion finished");
        Ok(response)
    }
    .instrument(span)
    .await
}
