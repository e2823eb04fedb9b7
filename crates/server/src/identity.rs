//! Identity extraction from free-text conversation.
//!
//! The extracted email is the caller's verified identity for the rest of
//! the request. It is established exactly once per request and never
//! reassigned; the model's tool arguments are checked against it, never
//! trusted in its place.

use techtrend_support_core::{ChatMessage, Email, MessageRole};

/// Extract the caller's identity from the conversation.
///
/// Scans user messages newest-first and returns the first syntactically
/// valid email found, normalized. Tolerates two common typos: whitespace
/// around the `@` and a comma typed instead of a dot in the domain.
/// Assistant messages are ignored so the model can never plant an
/// identity. Returns `None` when no message yields a valid address;
/// callers must treat that as "authentication required".
#[must_use]
pub fn extract_identity(conversation: &[ChatMessage]) -> Option<Email> {
    conversation
        .iter()
        .rev()
        .filter(|message| message.role == MessageRole::User)
        .find_map(|message| first_email(&message.content))
}

fn first_email(text: &str) -> Option<Email> {
    let collapsed = collapse_at_spacing(text);
    collapsed
        .split_whitespace()
        .filter(|token| token.contains('@'))
        .find_map(|token| {
            let candidate = token
                .trim_matches(|c: char| !c.is_alphanumeric() && c != '@')
                .replace(',', ".");
            Email::parse(&candidate).ok()
        })
}

/// Remove whitespace runs directly adjacent to an `@`, so
/// `"alice @ example.com"` becomes one token.
fn collapse_at_spacing(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let chars: Vec<char> = text.chars().collect();
    let mut i = 0;
    while let Some(&c) = chars.get(i) {
        if c.is_whitespace() {
            let mut j = i;
            while chars.get(j).is_some_and(|c| c.is_whitespace()) {
                j += 1;
            }
            let next_is_at = chars.get(j) == Some(&'@');
            let prev_is_at = out.ends_with('@');
            if !next_is_at && !prev_is_at {
                out.push(' ');
            }
            i = j;
        } else {
            out.push(c);
            i += 1;
        }
    }
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn user(content: &str) -> ChatMessage {
        ChatMessage::user(content)
    }

    #[test]
    fn test_extracts_plain_email() {
        let messages = [user("show my orders for alice@example.com")];
        let identity = extract_identity(&messages).unwrap();
        assert_eq!(identity.as_str(), "alice@example.com");
    }

    #[test]
    fn test_newest_message_wins() {
        let messages = [
            user("my email is old@example.com"),
            user("actually use new@example.com"),
        ];
        let identity = extract_identity(&messages).unwrap();
        assert_eq!(identity.as_str(), "new@example.com");
    }

    #[test]
    fn test_falls_back_to_older_messages() {
        let messages = [user("orders for alice@example.com please"), user("thanks!")];
        let identity = extract_identity(&messages).unwrap();
        assert_eq!(identity.as_str(), "alice@example.com");
    }

    #[test]
    fn test_assistant_messages_are_ignored() {
        let messages = [
            ChatMessage::assistant("is your email mallory@example.com?"),
            user("show me something"),
        ];
        assert!(extract_identity(&messages).is_none());
    }

    #[test]
    fn test_normalizes_case() {
        let messages = [user("I'm Alice@Example.COM")];
        let identity = extract_identity(&messages).unwrap();
        assert_eq!(identity.as_str(), "alice@example.com");
    }

    #[test]
    fn test_tolerates_comma_typo() {
        let messages = [user("my address is alice@example,com")];
        let identity = extract_identity(&messages).unwrap();
        assert_eq!(identity.as_str(), "alice@example.com");
    }

    #[test]
    fn test_tolerates_spaces_around_at() {
        let messages = [user("it's alice @ example.com thanks")];
        let identity = extract_identity(&messages).unwrap();
        assert_eq!(identity.as_str(), "alice@example.com");
    }

    #[test]
    fn test_strips_trailing_punctuation() {
        let messages = [user("reach me at alice@example.com, please")];
        let identity = extract_identity(&messages).unwrap();
        assert_eq!(identity.as_str(), "alice@example.com");
    }

    #[test]
    fn test_no_email_returns_none() {
        let messages = [user("hi"), user("where is my package?")];
        assert!(extract_identity(&messages).is_none());
    }

    #[test]
    fn test_invalid_email_returns_none() {
        let messages = [user("try not@valid or @nothing")];
        assert!(extract_identity(&messages).is_none());
    }

    #[test]
    fn test_extraction_is_idempotent() {
        let messages = [user("  Alice@Example,COM ")];
        let first = extract_identity(&messages).unwrap();
        let again = extract_identity(&[user(first.as_str())]).unwrap();
        assert_eq!(first, again);
    }
}
