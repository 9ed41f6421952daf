//! Stateless streaming chat over the configured LLM provider.
//!
//! The client resends the whole history with every request; nothing is
//! stored server-side.

use std::pin::Pin;
use std::sync::Arc;

use futures_util::{Stream, StreamExt};

use delve_types::config::LlmConfig;
use delve_types::llm::{CompletionRequest, LlmError, Message, StreamEvent};

use crate::llm::box_provider::BoxLlmProvider;

/// Stream of text fragments from one chat turn.
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String, LlmError>> + Send + 'static>>;

pub struct ChatService {
    llm: Arc<BoxLlmProvider>,
    model: String,
    max_tokens: u32,
    temperature: Option<f64>,
}

impl ChatService {
    pub fn new(llm: Arc<BoxLlmProvider>, config: &LlmConfig) -> Self {
        Self {
            llm,
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        }
    }

    /// Start a streaming completion for `messages` and yield only the text
    /// deltas, in order.
    pub fn stream_text(&self, messages: Vec<Message>) -> Result<TextStream, LlmError> {
        if messages.is_empty() {
            return Err(LlmError::InvalidRequest(
                "Messages array is required".to_string(),
            ));
        }

        let mut request = CompletionRequest::new(&self.model, messages, self.max_tokens);
        request.temperature = self.temperature;
        request.stream = true;

        tracing::debug!(
            gen_ai.system = self.llm.name(),
            gen_ai.request.model = %request.model,
            gen_ai.request.max_tokens = request.max_tokens,
            gen_ai.request.stream = true,
            messages = request.messages.len(),
            "starting chat stream"
        );

        let events = self.llm.stream(request);
        Ok(Box::pin(events.filter_map(|event| async move {
            match event {
                Ok(StreamEvent::TextDelta { text, .. }) => Some(Ok(text)),
                Ok(_) => None,
                Err(e) => Some(Err(e)),
            }
        })))
    }
}
