use std::fmt;

use serde::{Deserialize, Serialize};

use super::ToolCall;

/// The role a message plays in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageType {
    #[serde(rename = "system")]
    SystemMessage,
    #[serde(rename = "human")]
    HumanMessage,
    #[serde(rename = "ai")]
    AIMessage,
    #[serde(rename = "tool")]
    ToolMessage,
    #[serde(rename = "function")]
    FunctionMessage,
    #[serde(rename = "generic")]
    GenericMessage,
}

impl MessageType {
    /// Lowercase wire name, used verbatim when prompts are flattened to text.
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::SystemMessage => "system",
            MessageType::HumanMessage => "human",
            MessageType::AIMessage => "ai",
            MessageType::ToolMessage => "tool",
            MessageType::FunctionMessage => "function",
            MessageType::GenericMessage => "generic",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One piece of a message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ContentPart {
    Text {
        text: String,
    },
    /// Raw bytes, e.g. an image, together with its MIME type.
    Binary {
        mime_type: String,
        data: Vec<u8>,
    },
    ToolCall(ToolCall),
    ToolCallResponse {
        tool_call_id: String,
        name: String,
        content: String,
    },
}

impl ContentPart {
    pub fn text<S: Into<String>>(text: S) -> Self {
        ContentPart::Text { text: text.into() }
    }

    pub fn binary<S: Into<String>>(mime_type: S, data: Vec<u8>) -> Self {
        ContentPart::Binary {
            mime_type: mime_type.into(),
            data,
        }
    }

    /// Short name of the part kind, used in log lines and errors.
    pub fn kind(&self) -> &'static str {
        match self {
            ContentPart::Text { .. } => "text",
            ContentPart::Binary { .. } => "image",
            ContentPart::ToolCall(_) => "tool_call",
            ContentPart::ToolCallResponse { .. } => "tool_result",
        }
    }
}

/// A single conversation turn: a role and its ordered parts.
///
/// Messages are built by the caller and only read by the providers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub message_type: MessageType,
    pub parts: Vec<ContentPart>,
}

impl Message {
    pub fn new(message_type: MessageType, parts: Vec<ContentPart>) -> Self {
        Self {
            message_type,
            parts,
        }
    }

    pub fn new_human_message<T: fmt::Display>(content: T) -> Self {
        Self::new(
            MessageType::HumanMessage,
            vec![ContentPart::text(content.to_string())],
        )
    }

    pub fn new_system_message<T: fmt::Display>(content: T) -> Self {
        Self::new(
            MessageType::SystemMessage,
            vec![ContentPart::text(content.to_string())],
        )
    }

    pub fn new_ai_message<T: fmt::Display>(content: T) -> Self {
        Self::new(
            MessageType::AIMessage,
            vec![ContentPart::text(content.to_string())],
        )
    }

    pub fn new_tool_message<I, N, C>(tool_call_id: I, name: N, content: C) -> Self
    where
        I: Into<String>,
        N: Into<String>,
        C: Into<String>,
    {
        Self::new(
            MessageType::ToolMessage,
            vec![ContentPart::ToolCallResponse {
                tool_call_id: tool_call_id.into(),
                name: name.into(),
                content: content.into(),
            }],
        )
    }

    /// Append another part to this message.
    pub fn with_part(mut self, part: ContentPart) -> Self {
        self.parts.push(part);
        self
    }

    /// Concatenated text of all text parts.
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|part| match part {
                ContentPart::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }
}
