//! HTTP route handlers.

mod chat;

pub use chat::{ChatRequest, ChatResponseBody};

use axum::{Router, routing::post};

use crate::state::AppState;

/// Build the API router.
pub fn routes() -> Router<AppState> {
    Router::new().route("/api/chat", post(chat::chat))
}
