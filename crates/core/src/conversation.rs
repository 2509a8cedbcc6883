//! Conversation messages as the chat client exchanges them.
//!
//! A [`ConversationMessage`] is a role plus an ordered list of typed parts
//! (text, tool call, tool result). Messages are appended to a conversation
//! and never edited once the response that produced them has finished.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::message::{Message, MessageToolCall};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationRole {
    User,
    Assistant,
    System,
}

/// One typed piece of a conversation message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum MessagePart {
    Text {
        text: String,
    },
    ToolCall {
        tool_call_id: String,
        tool_name: String,
        input: serde_json::Value,
    },
    ToolResult {
        tool_call_id: String,
        tool_name: String,
        output: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawConversationMessage")]
pub struct ConversationMessage {
    pub id: String,
    pub role: ConversationRole,
    pub parts: Vec<MessagePart>,
}

/// Wire shape accepted from clients: either `parts` or a plain
/// `content` / `text` string.
#[derive(Deserialize)]
struct RawConversationMessage {
    #[serde(default)]
    id: Option<String>,
    role: ConversationRole,
    #[serde(default)]
    parts: Vec<MessagePart>,
    #[serde(default, alias = "text")]
    content: Option<String>,
}

impl From<RawConversationMessage> for ConversationMessage {
    fn from(raw: RawConversationMessage) -> Self {
        let mut parts = raw.parts;
        if parts.is_empty() {
            if let Some(text) = raw.content.filter(|t| !t.is_empty()) {
                parts.push(MessagePart::Text { text });
            }
        }
        Self {
            id: raw.id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            role: raw.role,
            parts,
        }
    }
}

impl ConversationMessage {
    pub fn new(role: ConversationRole, parts: Vec<MessagePart>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            parts,
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(ConversationRole::User, vec![MessagePart::Text { text: text.into() }])
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(
            ConversationRole::Assistant,
            vec![MessagePart::Text { text: text.into() }],
        )
    }

    /// All text parts concatenated in order.
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| match p {
                MessagePart::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Open a new text part for a streamed span.
    pub fn start_text(&mut self) {
        self.parts.push(MessagePart::Text {
            text: String::new(),
        });
    }

    /// Close a streamed span, dropping its part if no text arrived.
    pub fn end_text(&mut self) {
        if matches!(self.parts.last(), Some(MessagePart::Text { text }) if text.is_empty()) {
            self.parts.pop();
        }
    }

    /// Append a text delta, extending the trailing text part when there is one.
    pub fn push_text(&mut self, delta: &str) {
        if let Some(MessagePart::Text { text }) = self.parts.last_mut() {
            text.push_str(delta);
        } else {
            self.parts.push(MessagePart::Text {
                text: delta.to_string(),
            });
        }
    }
}

/// Full text of the most recent user message, if any.
pub fn latest_user_text(messages: &[ConversationMessage]) -> Option<String> {
    messages
        .iter()
        .rev()
        .find(|m| m.role == ConversationRole::User)
        .map(ConversationMessage::text)
}

/// Flatten conversation messages into a provider transcript.
///
/// Assistant tool-call parts become `tool_calls` on the assistant message;
/// tool-result parts follow it as `tool` role messages.
pub fn to_provider_messages(messages: &[ConversationMessage]) -> Vec<Message> {
    let mut out = Vec::with_capacity(messages.len());

    for msg in messages {
        match msg.role {
            ConversationRole::System => out.push(Message::system(msg.text())),
            ConversationRole::User => out.push(Message::user(msg.text())),
            ConversationRole::Assistant => {
                let mut assistant = Message::assistant(msg.text());
                let mut results = Vec::new();

                for part in &msg.parts {
                    match part {
                        MessagePart::ToolCall {
                            tool_call_id,
                            tool_name,
                            input,
                        } => assistant.tool_calls.push(MessageToolCall {
                            id: tool_call_id.clone(),
                            name: tool_name.clone(),
                            arguments: input.to_string(),
                        }),
                        MessagePart::ToolResult {
                            tool_call_id,
                            output,
                            ..
                        } => results.push(Message::tool_result(tool_call_id, output)),
                        MessagePart::Text { .. } => {}
                    }
                }

                if !assistant.content.is_empty() || !assistant.tool_calls.is_empty() {
                    out.push(assistant);
                }
                out.extend(results);
            }
        }
    }

    out
}
