//! Chat endpoint.
//!
//! `POST /api/chat` takes the conversation so far and returns the
//! assistant's answer. The default framing is a server-sent event stream
//! (`event: message` with the answer, then `event: done` with `[DONE]`);
//! `?stream=false` returns one JSON object instead.

use std::convert::Infallible;

use async_stream::stream;
use axum::extract::{Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use techtrend_support_core::ChatMessage;

use crate::error::AppError;
use crate::query::QueryResult;
use crate::services::ChatService;
use crate::state::AppState;
use crate::tools::CardComponent;

/// Request body for `POST /api/chat`.
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    /// Conversation turns, oldest first.
    pub messages: Vec<ChatMessage>,
}

/// Query parameters for `POST /api/chat`.
#[derive(Debug, Default, Deserialize)]
pub struct ChatParams {
    /// Set to `false` for a single JSON response instead of SSE.
    pub stream: Option<bool>,
}

/// JSON response body when streaming is disabled.
#[derive(Debug, Serialize)]
pub struct ChatResponseBody {
    /// Final assistant text.
    pub text: String,
    /// Structured tool results.
    pub data: Vec<QueryResult>,
    /// Card components for the widget.
    pub ui_components: Vec<CardComponent>,
    /// Unique ID for this response.
    pub request_id: Uuid,
}

/// One SSE message payload.
#[derive(Debug, Serialize)]
struct MessagePayload {
    id: Uuid,
    role: &'static str,
    content: String,
}

/// Handle a chat turn.
pub async fn chat(
    State(state): State<AppState>,
    Query(params): Query<ChatParams>,
    Json(request): Json<ChatRequest>,
) -> Result<Response, AppError> {
    if request.messages.is_empty() {
        return Err(AppError::BadRequest("messages must not be empty".into()));
    }

    let service = ChatService::new(state.gemini(), state.store());
    let outcome = service.respond(&request.messages).await?;

    if params.stream == Some(false) {
        let body = ChatResponseBody {
            text: outcome.text,
            data: outcome.data,
            ui_components: outcome.ui_components,
            request_id: Uuid::new_v4(),
        };
        return Ok(Json(body).into_response());
    }

    let payload = MessagePayload {
        id: Uuid::new_v4(),
        role: "assistant",
        content: outcome.text,
    };

    let event_stream = stream! {
        let message = Event::default()
            .event("message")
            .json_data(&payload)
            .unwrap_or_else(|_| Event::default().event("message").data("{}"));
        yield Ok::<Event, Infallible>(message);
        yield Ok(Event::default().event("done").data("[DONE]"));
    };

    Ok(Sse::new(event_stream)
        .keep_alive(KeepAlive::default())
        .into_response())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_request_deserializes() {
        let body = r#"{"messages": [{"role": "user", "content": "hi"}]}"#;
        let request: ChatRequest = serde_json::from_str(body).unwrap();
        assert_eq!(request.messages.len(), 1);
    }

    #[test]
    fn test_response_body_shape() {
        let body = ChatResponseBody {
            text: "Hello!".into(),
            data: Vec::new(),
            ui_components: Vec::new(),
            request_id: Uuid::nil(),
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["text"], serde_json::json!("Hello!"));
        assert!(value["data"].as_array().unwrap().is_empty());
        assert!(value["ui_components"].as_array().unwrap().is_empty());
        assert!(value.get("request_id").is_some());
    }
}
