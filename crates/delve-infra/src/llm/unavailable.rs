//! Provider used when no completion backend can be configured.
//!
//! Every call fails with `AuthenticationFailed`, so jobs fail with a clear
//! message instead of the process refusing to start.

use delve_core::llm::provider::{LlmEventStream, LlmProvider};
use delve_types::llm::{CompletionRequest, CompletionResponse, LlmError, ProviderCapabilities};

pub struct UnavailableProvider {
    capabilities: ProviderCapabilities,
}

impl UnavailableProvider {
    /// No API key was found in the environment.
    pub fn missing_key() -> Self {
        Self {
            capabilities: ProviderCapabilities {
                streaming: false,
                tool_calling: false,
                max_context_tokens: 0,
                max_output_tokens: 0,
            },
        }
    }
}

impl LlmProvider for UnavailableProvider {
    fn name(&self) -> &str {
        "unavailable"
    }

    fn capabilities(&self) -> &ProviderCapabilities {
        &self.capabilities
    }

    async fn complete(&self, _request: &CompletionRequest) -> Result<CompletionResponse, LlmError> {
        Err(LlmError::AuthenticationFailed)
    }

    fn stream(&self, _request: CompletionRequest) -> LlmEventStream {
        Box::pin(futures_util::stream::once(async {
            Err(LlmError::AuthenticationFailed)
        }))
    }
}
