//! Unified error handling for the support server.

use std::time::Duration;

use axum::{
    http::{HeaderValue, StatusCode, header::RETRY_AFTER},
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::gemini::GeminiError;
use crate::services::ChatError;

/// Application-level error type for the HTTP surface.
///
/// Pipeline failures never reach this type; the tool façade converts them
/// into structured payloads inside the response body. `AppError` covers
/// what is left: bad requests, rate limiting, and model/transport faults.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Caller exceeded the per-IP rate limit.
    #[error("Too many requests")]
    RateLimited(Duration),

    /// Model provider call failed.
    #[error("Model error: {0}")]
    Model(#[from] GeminiError),

    /// Chat orchestration failed.
    #[error("Chat error: {0}")]
    Chat(#[from] ChatError),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if matches!(self, Self::Internal(_) | Self::Model(_) | Self::Chat(_)) {
            tracing::error!(error = %self, "chat request error");
        }

        let status = match &self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            Self::Model(_) | Self::Chat(ChatError::Gemini(_)) => StatusCode::BAD_GATEWAY,
            Self::Chat(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        // Don't expose internal error details to clients
        let message = match &self {
            Self::BadRequest(_) => self.to_string(),
            Self::RateLimited(_) => "Too many requests, please slow down".to_string(),
            Self::Model(_) | Self::Chat(_) => "The assistant is temporarily unavailable".to_string(),
            Self::Internal(_) => "Internal server error".to_string(),
        };

        let mut response = (status, message).into_response();
        if let Self::RateLimited(retry_after) = &self
            && let Ok(value) = HeaderValue::from_str(&retry_after.as_secs().max(1).to_string())
        {
            response.headers_mut().insert(RETRY_AFTER, value);
        }
        response
    }
}
