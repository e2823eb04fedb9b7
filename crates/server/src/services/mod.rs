//! Business logic services.

mod chat;
mod prompt;

pub use chat::{ChatError, ChatOutcome, ChatService, MAX_TOOL_ITERATIONS};
pub use prompt::SYSTEM_PROMPT;
