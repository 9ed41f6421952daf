//! SSE stream creation and state machine for Anthropic Messages API.
//!
//! Implements the streaming protocol described in the Anthropic docs:
//! 1. `message_start` -- Message object with initial usage
//! 2. Per block: `content_block_start` -> N x `content_block_delta` -> `content_block_stop`
//! 3. `message_delta` -- stop_reason and cumulative usage
//! 4. `message_stop` -- final event
//! 5. `ping` events may appear anywhere (keepalive)
//! 6. `error` events may appear mid-stream
//!
//! Tool use input arrives as partial JSON fragments via `input_json_delta`.
//! These are accumulated per content block index and parsed only after
//! `content_block_stop`.

use std::collections::HashMap;

use futures_util::StreamExt;
use reqwest_eventsource::{Event, EventSource};
use secrecy::{ExposeSecret, SecretString};

use delve_core::llm::provider::LlmEventStream;
use delve_types::llm::{LlmError, StopReason, StreamEvent, Usage};

use super::client::{API_VERSION, map_http_error, retry_after_ms};
use super::types::{
    AnthropicContentBlock, AnthropicDelta, AnthropicRequest, ContentBlockDeltaPayload,
    ContentBlockStartPayload, ContentBlockStopPayload, ErrorPayload, MessageDeltaPayload,
    MessageStartPayload,
};

/// Accumulates partial JSON fragments for a tool use block.
struct ToolUseAccumulator {
    id: String,
    name: String,
    json_buffer: String,
}

/// Translates Anthropic SSE events into [`StreamEvent`]s.
#[derive(Default)]
pub(crate) struct StreamState {
    tools: HashMap<u32, ToolUseAccumulator>,
    usage: Usage,
    finished: bool,
}

impl StreamState {
    /// Whether `message_stop` has been seen.
    pub(crate) fn finished(&self) -> bool {
        self.finished
    }

    /// Handle one SSE event by name. Returns the events to emit, in order.
    pub(crate) fn handle(&mut self, event: &str, data: &str) -> Result<Vec<StreamEvent>, LlmError> {
        let mut out = Vec::new();
        match event {
            "message_start" => {
                let payload: MessageStartPayload = decode(event, data)?;
                if let Some(usage) = payload.message.usage {
                    self.usage.input_tokens = usage.input_tokens;
                    self.usage.cache_creation_input_tokens = usage.cache_creation_input_tokens;
                    self.usage.cache_read_input_tokens = usage.cache_read_input_tokens;
                }
                tracing::debug!(id = %payload.message.id, model = %payload.message.model, "anthropic stream started");
            }
            "content_block_start" => {
                let payload: ContentBlockStartPayload = decode(event, data)?;
                out.push(StreamEvent::ContentBlockStart {
                    index: payload.index,
                    content_type: payload.content_block.type_name().to_string(),
                });
                match payload.content_block {
                    AnthropicContentBlock::Text { text } if !text.is_empty() => {
                        out.push(StreamEvent::TextDelta {
                            index: payload.index,
                            text,
                        });
                    }
                    AnthropicContentBlock::ToolUse { id, name, .. } => {
                        self.tools.insert(
                            payload.index,
                            ToolUseAccumulator {
                                id,
                                name,
                                json_buffer: String::new(),
                            },
                        );
                    }
                    _ => {}
                }
            }
            "content_block_delta" => {
                let payload: ContentBlockDeltaPayload = decode(event, data)?;
                match payload.delta {
                    AnthropicDelta::TextDelta { text } => {
                        out.push(StreamEvent::TextDelta {
                            index: payload.index,
                            text,
                        });
                    }
                    AnthropicDelta::InputJsonDelta { partial_json } => {
                        if let Some(acc) = self.tools.get_mut(&payload.index) {
                            acc.json_buffer.push_str(&partial_json);
                        }
                    }
                    AnthropicDelta::Unsupported => {}
                }
            }
            "content_block_stop" => {
                let payload: ContentBlockStopPayload = decode(event, data)?;
                if let Some(acc) = self.tools.remove(&payload.index) {
                    let input = if acc.json_buffer.trim().is_empty() {
                        serde_json::json!({})
                    } else {
                        serde_json::from_str(&acc.json_buffer).map_err(|e| {
                            LlmError::Deserialization(format!(
                                "invalid tool input JSON for {}: {e}",
                                acc.name
                            ))
                        })?
                    };
                    out.push(StreamEvent::ToolUseComplete {
                        id: acc.id,
                        name: acc.name,
                        input,
                    });
                }
                out.push(StreamEvent::ContentBlockStop {
                    index: payload.index,
                });
            }
            "message_delta" => {
                let payload: MessageDeltaPayload = decode(event, data)?;
                self.usage.output_tokens = payload.usage.output_tokens;
                if let Some(reason) = payload.delta.stop_reason {
                    out.push(StreamEvent::MessageDelta {
                        stop_reason: reason.parse().unwrap_or(StopReason::EndTurn),
                    });
                }
            }
            "message_stop" => {
                self.finished = true;
                out.push(StreamEvent::Usage(self.usage.clone()));
                out.push(StreamEvent::Done);
            }
            "ping" => {}
            "error" => {
                let payload: ErrorPayload = decode(event, data)?;
                return Err(map_stream_error(&payload.error.error_type, payload.error.message));
            }
            other => {
                tracing::trace!(event = other, "ignoring unknown anthropic stream event");
            }
        }
        Ok(out)
    }
}

fn decode<T: serde::de::DeserializeOwned>(event: &str, data: &str) -> Result<T, LlmError> {
    serde_json::from_str(data)
        .map_err(|e| LlmError::Deserialization(format!("failed to parse {event} event: {e}")))
}

fn map_stream_error(error_type: &str, message: String) -> LlmError {
    match error_type {
        "overloaded_error" => LlmError::Overloaded(message),
        "rate_limit_error" => LlmError::RateLimited {
            retry_after_ms: None,
        },
        "authentication_error" => LlmError::AuthenticationFailed,
        "invalid_request_error" => LlmError::InvalidRequest(message),
        _ => LlmError::Stream(format!("{error_type}: {message}")),
    }
}

/// Create a streaming SSE connection to the Anthropic Messages API.
///
/// The returned stream yields `Connected` once the response headers arrive,
/// then the translated events, and ends after `Done`. A connection that
/// closes before `message_stop` ends with a stream error.
pub fn create_anthropic_stream(
    client: &reqwest::Client,
    url: &str,
    body: AnthropicRequest,
    api_key: &SecretString,
) -> LlmEventStream {
    let builder = client
        .post(url)
        .header("x-api-key", api_key.expose_secret())
        .header("anthropic-version", API_VERSION)
        .header("content-type", "application/json")
        .json(&body);

    Box::pin(async_stream::try_stream! {
        let mut es = EventSource::new(builder)
            .map_err(|e| LlmError::Stream(format!("failed to open event stream: {e}")))?;
        es.set_retry_policy(Box::new(reqwest_eventsource::retry::Never));

        let mut state = StreamState::default();

        while let Some(event) = es.next().await {
            match event {
                Ok(Event::Open) => {
                    yield StreamEvent::Connected;
                }
                Ok(Event::Message(message)) => {
                    for event in state.handle(&message.event, &message.data)? {
                        yield event;
                    }
                    if state.finished() {
                        es.close();
                        break;
                    }
                }
                Err(reqwest_eventsource::Error::StreamEnded) => break,
                Err(reqwest_eventsource::Error::InvalidStatusCode(status, response)) => {
                    es.close();
                    let retry_after = retry_after_ms(response.headers());
                    let error_body = response.text().await.unwrap_or_default();
                    Err::<(), LlmError>(map_http_error(status.as_u16(), retry_after, &error_body))?;
                }
                Err(e) => {
                    es.close();
                    Err::<(), LlmError>(LlmError::Stream(e.to_string()))?;
                }
            }
        }

        if !state.finished() {
            Err::<(), LlmError>(LlmError::Stream(
                "stream closed before message_stop".to_string(),
            ))?;
        }
    })
}
