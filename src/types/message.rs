//! Message types for model communication.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A message in a conversation transcript.
///
/// The transcript is append-only during a single query: messages are never
/// mutated after they are pushed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelMessage {
    pub role: Role,
    pub content: Vec<ContentPart>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl ModelMessage {
    /// Create a user message.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: vec![ContentPart::Text { text: text.into() }],
            timestamp: Some(Utc::now()),
        }
    }

    /// Create an assistant message.
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: vec![ContentPart::Text { text: text.into() }],
            timestamp: Some(Utc::now()),
        }
    }

    /// Create a user message carrying raw tool result content blocks.
    ///
    /// This mirrors the shape the Messages API expects for tool-result
    /// continuation: the blocks are forwarded verbatim as user content.
    pub fn tool_result(content: Vec<serde_json::Value>) -> Self {
        Self {
            role: Role::User,
            content: vec![ContentPart::ToolResult { content }],
            timestamp: Some(Utc::now()),
        }
    }

    /// Extract the text content, concatenating all text parts.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|part| match part {
                ContentPart::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }
}

/// Conversation role.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A single part of message content.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    /// Raw content blocks returned by a tool call, forwarded unchanged.
    ToolResult { content: Vec<serde_json::Value> },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_concatenates_text_parts_only() {
        let msg = ModelMessage {
            role: Role::User,
            content: vec![
                ContentPart::Text {
                    text: "hello ".into(),
                },
                ContentPart::ToolResult {
                    content: vec![serde_json::json!({"type": "text", "text": "ignored"})],
                },
                ContentPart::Text {
                    text: "world".into(),
                },
            ],
            timestamp: None,
        };
        assert_eq!(msg.text(), "hello world");
    }

    #[test]
    fn constructors_set_roles() {
        assert_eq!(ModelMessage::user("q").role, Role::User);
        assert_eq!(ModelMessage::assistant("a").role, Role::Assistant);
        assert_eq!(ModelMessage::tool_result(Vec::new()).role, Role::User);
    }
}
