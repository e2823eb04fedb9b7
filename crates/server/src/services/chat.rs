//! Chat service orchestrating the model conversation.
//!
//! One inbound request flows through: greeting short-circuit, identity
//! extraction, model call with the `db_query` tool advertised, tool
//! execution, and a final model turn that writes the answer. The model
//! call is the only retried step; a data-layer failure is surfaced as a
//! structured tool payload, never retried silently.

use std::time::Duration;

use tracing::{info, instrument, warn};

use techtrend_support_core::{ChatMessage, Email, MessageRole};

use crate::gemini::{
    Content, FunctionResponse, GeminiClient, GeminiError, GenerateRequest, GenerateResponse,
    GenerationConfig, Part, ToolDecl,
};
use crate::identity::extract_identity;
use crate::query::{Datastore, QueryResult};
use crate::tools::{CardComponent, DbQueryInput, build_cards, db_query_declaration, run_db_query};

use super::prompt::SYSTEM_PROMPT;

/// Maximum number of tool use iterations to prevent infinite loops.
pub const MAX_TOOL_ITERATIONS: usize = 4;

/// Total model call attempts per turn (1 initial + 2 retries).
const MODEL_CALL_ATTEMPTS: u32 = 3;
/// Initial retry backoff; doubles per attempt.
const RETRY_BASE_DELAY: Duration = Duration::from_millis(500);
/// Backoff ceiling.
const RETRY_MAX_DELAY: Duration = Duration::from_secs(5);

/// Canned reply for bare greetings; skips the model entirely.
const GREETING_REPLY: &str = "Hello! How can I assist you today?";

/// Errors that can occur in the chat service.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    /// Gemini API error after retries were exhausted.
    #[error("Gemini API error: {0}")]
    Gemini(#[from] GeminiError),

    /// The model returned neither text nor a tool call.
    #[error("model returned an empty response")]
    EmptyResponse,

    /// Too many tool iterations (possible loop).
    #[error("too many tool iterations")]
    TooManyToolIterations,
}

/// The assistant's complete answer for one request.
#[derive(Debug, Clone)]
pub struct ChatOutcome {
    /// Final assistant text.
    pub text: String,
    /// Structured results from successful tool calls, in call order.
    pub data: Vec<QueryResult>,
    /// Card components generated from the results.
    pub ui_components: Vec<CardComponent>,
}

/// Chat service for one request.
pub struct ChatService<'a, S> {
    gemini: &'a GeminiClient,
    store: &'a S,
}

impl<'a, S: Datastore> ChatService<'a, S> {
    /// Create a new chat service.
    #[must_use]
    pub const fn new(gemini: &'a GeminiClient, store: &'a S) -> Self {
        Self { gemini, store }
    }

    /// Produce the assistant's answer for a conversation.
    ///
    /// Identity is extracted exactly once, before the model runs, and is
    /// the only identity the tool ever trusts.
    ///
    /// # Errors
    ///
    /// Returns an error if the model call fails after retries or the model
    /// yields nothing usable.
    #[instrument(skip(self, messages), fields(turns = messages.len()))]
    pub async fn respond(&self, messages: &[ChatMessage]) -> Result<ChatOutcome, ChatError> {
        if let Some(reply) = greeting_reply(messages) {
            return Ok(ChatOutcome {
                text: reply.to_owned(),
                data: Vec::new(),
                ui_components: Vec::new(),
            });
        }

        let identity = extract_identity(messages);
        let mut contents = to_contents(messages);
        let tools = vec![ToolDecl {
            function_declarations: vec![db_query_declaration()],
        }];

        let mut data: Vec<QueryResult> = Vec::new();
        let mut ui_components: Vec<CardComponent> = Vec::new();
        let mut iterations = 0;

        loop {
            iterations += 1;
            if iterations > MAX_TOOL_ITERATIONS {
                warn!("too many tool iterations, stopping");
                return Err(ChatError::TooManyToolIterations);
            }

            let response = self.call_model(&contents, &tools).await?;
            let calls: Vec<_> = response
                .function_calls()
                .into_iter()
                .cloned()
                .collect();

            info!(
                function_calls = calls.len(),
                has_text = !response.text().is_empty(),
                "model response received"
            );

            if calls.is_empty() {
                let text = response.text();
                if text.trim().is_empty() {
                    return Err(ChatError::EmptyResponse);
                }
                return Ok(ChatOutcome {
                    text,
                    data,
                    ui_components,
                });
            }

            // Echo the model turn, then answer each call with a tool result.
            let model_parts: Vec<Part> = calls
                .iter()
                .map(|call| Part::FunctionCall {
                    function_call: call.clone(),
                })
                .collect();
            contents.push(Content {
                role: "model".to_owned(),
                parts: model_parts,
            });

            let mut response_parts = Vec::with_capacity(calls.len());
            for call in calls {
                let result = self
                    .execute_tool(&call.name, &call.args, identity.as_ref())
                    .await;

                if let crate::tools::ToolResponse::Result(query_result) = &result {
                    ui_components.extend(build_cards(identity.as_ref(), query_result));
                    data.push(query_result.clone());
                }

                let response_json =
                    serde_json::to_value(&result).unwrap_or_else(|e| {
                        warn!(error = %e, "failed to serialize tool response");
                        serde_json::json!({
                            "error": true,
                            "message": "tool response serialization failed",
                        })
                    });
                response_parts.push(Part::FunctionResponse {
                    function_response: FunctionResponse {
                        name: call.name,
                        response: response_json,
                    },
                });
            }
            contents.push(Content {
                role: "user".to_owned(),
                parts: response_parts,
            });
        }
    }

    async fn execute_tool(
        &self,
        name: &str,
        args: &serde_json::Value,
        identity: Option<&Email>,
    ) -> crate::tools::ToolResponse {
        if name != "db_query" {
            warn!(tool = name, "model called an unknown tool");
            return unknown_tool_response(name);
        }

        match serde_json::from_value::<DbQueryInput>(args.clone()) {
            Ok(input) => run_db_query(self.store, identity, &input).await,
            Err(e) => {
                warn!(error = %e, "model sent malformed tool arguments");
                malformed_args_response()
            }
        }
    }

    /// Call the model with bounded exponential-backoff retries.
    ///
    /// Up to two extra attempts on transient failures, delay doubling from
    /// 500ms and capped at 5s. Non-transient failures return immediately.
    async fn call_model(
        &self,
        contents: &[Content],
        tools: &[ToolDecl],
    ) -> Result<GenerateResponse, GeminiError> {
        let request = GenerateRequest {
            system_instruction: Some(Content {
                role: "user".to_owned(),
                parts: vec![Part::Text {
                    text: SYSTEM_PROMPT.to_owned(),
                }],
            }),
            contents: contents.to_vec(),
            tools: Some(tools.to_vec()),
            generation_config: Some(GenerationConfig {
                temperature: Some(0.7),
                max_output_tokens: None,
            }),
        };

        let mut delay = RETRY_BASE_DELAY;
        let mut attempt = 1;
        loop {
            match self.gemini.generate(&request).await {
                Ok(response) => return Ok(response),
                Err(e) if should_retry(attempt, &e) => {
                    warn!(attempt, error = %e, delay_ms = delay.as_millis() as u64, "model call failed, retrying");
                    tokio::time::sleep(delay).await;
                    delay = next_delay(delay);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Whether a failed model call gets another attempt.
///
/// Only transient failures are retried, and only while the attempt budget
/// lasts. The data query downstream is never retried through this path.
fn should_retry(attempt: u32, error: &GeminiError) -> bool {
    attempt < MODEL_CALL_ATTEMPTS && error.is_transient()
}

/// Next backoff delay: doubled, capped at [`RETRY_MAX_DELAY`].
fn next_delay(delay: Duration) -> Duration {
    (delay * 2).min(RETRY_MAX_DELAY)
}

/// Detect a bare greeting as the latest user message.
fn greeting_reply(messages: &[ChatMessage]) -> Option<&'static str> {
    let last = messages.last()?;
    if last.role != MessageRole::User {
        return None;
    }
    let normalized = last.content.trim().to_lowercase();
    matches!(normalized.as_str(), "hi" | "hello" | "hey").then_some(GREETING_REPLY)
}

/// Convert transcript messages to model contents.
fn to_contents(messages: &[ChatMessage]) -> Vec<Content> {
    messages
        .iter()
        .map(|message| match message.role {
            MessageRole::User => Content::user(message.content.clone()),
            MessageRole::Assistant => Content::model(message.content.clone()),
        })
        .collect()
}

fn unknown_tool_response(name: &str) -> crate::tools::ToolResponse {
    use crate::tools::{ErrorKind, ErrorPayload, ToolResponse};
    let message = format!("The tool {name:?} is not available.");
    ToolResponse::Error(ErrorPayload {
        error: true,
        kind: ErrorKind::ValidationError,
        data: Vec::new(),
        message: message.clone(),
        suggestion: "Use the db_query tool for data lookups.".to_owned(),
        formatted: message,
    })
}

fn malformed_args_response() -> crate::tools::ToolResponse {
    use crate::tools::{ErrorKind, ErrorPayload, ToolResponse};
    let message = "The query arguments were malformed.".to_owned();
    ToolResponse::Error(ErrorPayload {
        error: true,
        kind: ErrorKind::ValidationError,
        data: Vec::new(),
        message: message.clone(),
        suggestion: "Provide a type (customer, product, order, or ticket) and at least one \
                     identifier."
            .to_owned(),
        formatted: message,
    })
}
