//! SSE streaming chat endpoint.
//!
//! POST /api/v1/chat/stream
//!
//! Stateless: the client sends the whole conversation each time. Each text
//! fragment is sent as `data: {"text": "..."}` and the stream ends with
//! `data: [DONE]`. A provider failure mid-stream sends an `error` event
//! (`{"message": "..."}`) and closes the stream without `[DONE]`.

use std::convert::Infallible;
use std::time::Duration;

use axum::Json;
use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures_util::StreamExt;
use serde::Deserialize;
use tokio_stream::Stream;

use delve_types::llm::Message;

use crate::http::error::AppError;
use crate::state::AppState;

/// Request body for the streaming chat endpoint.
#[derive(Debug, Deserialize)]
pub struct ChatStreamRequest {
    #[serde(default)]
    pub messages: Option<Vec<Message>>,
}

/// POST /api/v1/chat/stream - SSE streaming chat.
pub async fn stream_chat(
    State(state): State<AppState>,
    Json(body): Json<ChatStreamRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let mut text = state
        .chat_service
        .stream_text(body.messages.unwrap_or_default())?;

    let sse_stream = async_stream::stream! {
        while let Some(item) = text.next().await {
            match item {
                Ok(fragment) => {
                    let data = serde_json::json!({ "text": fragment });
                    yield Ok::<_, Infallible>(Event::default().data(data.to_string()));
                }
                Err(e) => {
                    tracing::error!(error = %e, "chat stream failed");
                    let data = serde_json::json!({ "message": e.to_string() });
                    yield Ok(Event::default().event("error").data(data.to_string()));
                    return;
                }
            }
        }
        yield Ok(Event::default().data("[DONE]"));
    };

    Ok(Sse::new(sse_stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15))))
}
