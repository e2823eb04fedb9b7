//! Gemini API integration for the support assistant.
//!
//! This module provides:
//! - [`GeminiClient`] - HTTP client for the `generateContent` endpoint
//! - Request/response types for contents, parts, and tool declarations
//! - [`GeminiError`] - error types with transient-failure classification

mod client;
mod error;
mod types;

pub use client::GeminiClient;
pub use error::{ApiErrorResponse, GeminiError};
pub use types::{
    Candidate, Content, FunctionCall, FunctionDeclaration, FunctionResponse, GenerateRequest,
    GenerateResponse, GenerationConfig, Part, ToolDecl, UsageMetadata,
};
