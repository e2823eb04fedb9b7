//! Chat transcript types shared between the API surface and the model layer.

use serde::{Deserialize, Serialize};

/// Who authored a transcript message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// The end user typing into the widget.
    User,
    /// The assistant's reply.
    Assistant,
}

/// One turn of the conversation as submitted by the widget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Message author.
    pub role: MessageRole,
    /// Plain-text message body.
    pub content: String,
}

impl ChatMessage {
    /// Convenience constructor for a user message.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    /// Convenience constructor for an assistant message.
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_serde_shape() {
        let msg = ChatMessage::user("where is my order?");
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(
            json,
            "{\"role\":\"user\",\"content\":\"where is my order?\"}"
        );

        let parsed: ChatMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, msg);
    }
}
