//! Error types for the Gemini API client.

use thiserror::Error;

/// Errors that can occur when calling the Gemini API.
#[derive(Debug, Error)]
pub enum GeminiError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Gemini API returned an error.
    #[error("API error ({status}): {message}")]
    Api {
        /// gRPC-style status string, e.g. `UNAVAILABLE`.
        status: String,
        /// Error message.
        message: String,
    },

    /// Rate limited by the API.
    #[error("rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// Authentication failed.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Failed to parse response.
    #[error("parse error: {0}")]
    Parse(String),
}

impl GeminiError {
    /// Whether a retry with backoff is worthwhile.
    ///
    /// Transport failures, rate limiting, and the provider's transient
    /// status codes qualify; schema and auth failures do not.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(_) | Self::RateLimited(_) => true,
            Self::Api { status, .. } => matches!(
                status.as_str(),
                "UNAVAILABLE" | "INTERNAL" | "DEADLINE_EXCEEDED" | "RESOURCE_EXHAUSTED"
            ),
            Self::Unauthorized(_) | Self::Parse(_) => false,
        }
    }
}

/// API error response envelope from Gemini.
#[derive(Debug, serde::Deserialize)]
pub struct ApiErrorResponse {
    /// Nested error details.
    pub error: ApiError,
}

/// Nested error details.
#[derive(Debug, serde::Deserialize)]
pub struct ApiError {
    /// HTTP status code.
    pub code: i32,
    /// gRPC-style status string.
    #[serde(default)]
    pub status: String,
    /// Error message.
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gemini_error_display() {
        let err = GeminiError::RateLimited(30);
        assert_eq!(err.to_string(), "rate limited, retry after 30 seconds");

        let err = GeminiError::Api {
            status: "INVALID_ARGUMENT".to_string(),
            message: "contents must not be empty".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "API error (INVALID_ARGUMENT): contents must not be empty"
        );
    }

    #[test]
    fn test_transient_classification() {
        assert!(GeminiError::RateLimited(5).is_transient());
        assert!(
            GeminiError::Api {
                status: "UNAVAILABLE".into(),
                message: "overloaded".into(),
            }
            .is_transient()
        );
        assert!(
            !GeminiError::Api {
                status: "INVALID_ARGUMENT".into(),
                message: "bad request".into(),
            }
            .is_transient()
        );
        assert!(!GeminiError::Unauthorized("bad key".into()).is_transient());
    }

    #[test]
    fn test_api_error_deserialization() {
        let json = r#"{
            "error": {
                "code": 503,
                "message": "The model is overloaded.",
                "status": "UNAVAILABLE"
            }
        }"#;

        let response: ApiErrorResponse = serde_json::from_str(json).expect("deserialize");
        assert_eq!(response.error.code, 503);
        assert_eq!(response.error.status, "UNAVAILABLE");
        assert_eq!(response.error.message, "The model is overloaded.");
    }
}
