//! Bedrock Converse API.
//!
//! One request and reply shape for every model that supports Converse, with
//! tools described once instead of per provider. Requests and replies are
//! typed here; a [`BedrockTransport`](super::BedrockTransport) moves them
//! over the wire.
//!
//! Ref: <https://docs.aws.amazon.com/bedrock/latest/APIReference/API_runtime_Converse.html>

use std::{collections::HashMap, pin::Pin};

use futures::Stream;
use serde_json::{Map, Value};

use crate::{
    language_models::options::CallOptions,
    schemas::{ContentChoice, ContentPart, ContentResponse, FunctionCallBehavior, FunctionDefinition, ToolCall},
};

use super::{
    anthropic::anthropic_role,
    models::{chunk_by_role, BedrockMessage, TurnRole},
    stream::StreamEvent,
    BedrockError,
};

/// Decoded Converse stream events. Dropping the stream closes it.
pub type ConverseEventStream =
    Pin<Box<dyn Stream<Item = Result<StreamEvent, BedrockError>> + Send>>;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConverseRequest {
    /// System prompt blocks, in message order.
    pub system: Vec<String>,
    pub messages: Vec<ConverseMessage>,
    pub inference_config: InferenceConfig,
    pub tool_config: Option<ToolConfig>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConverseMessage {
    pub role: ConverseRole,
    pub content: Vec<ConverseBlock>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConverseRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConverseBlock {
    Text(String),
    Image {
        format: ImageFormat,
        bytes: Vec<u8>,
    },
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Png,
    Jpeg,
    Gif,
    Webp,
}

impl ImageFormat {
    /// Format from a MIME type such as `image/png`, or a bare subtype.
    pub fn from_mime_type(mime_type: &str) -> Result<Self, BedrockError> {
        match mime_type.strip_prefix("image/").unwrap_or(mime_type) {
            "png" => Ok(ImageFormat::Png),
            "jpeg" | "jpg" => Ok(ImageFormat::Jpeg),
            "gif" => Ok(ImageFormat::Gif),
            "webp" => Ok(ImageFormat::Webp),
            _ => Err(BedrockError::InvalidParameterError(format!(
                "unsupported image type: {}",
                mime_type
            ))),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct InferenceConfig {
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub stop_sequences: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ToolConfig {
    pub tools: Vec<FunctionDefinition>,
    /// `None` leaves the choice to the service, which defaults to auto.
    pub tool_choice: Option<ConverseToolChoice>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConverseToolChoice {
    Auto,
    Any,
    Tool(String),
}

/// A Converse reply as read back by the transport.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConverseOutput {
    /// Blocks of the reply message; `None` when the reply had no output.
    pub content: Option<Vec<ConverseBlock>>,
    pub stop_reason: String,
    pub usage: ConverseUsage,
    pub latency_ms: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConverseUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
}

fn converse_block(part: &ContentPart) -> Result<ConverseBlock, BedrockError> {
    let block = match part {
        ContentPart::Text { text } => ConverseBlock::Text(text.clone()),
        ContentPart::Binary { mime_type, data } => ConverseBlock::Image {
            format: ImageFormat::from_mime_type(mime_type)?,
            bytes: data.clone(),
        },
        ContentPart::ToolCall(call) => ConverseBlock::ToolUse {
            id: call.id.clone(),
            name: call.function.name.clone(),
            input: if call.function.arguments.is_empty() {
                Value::Object(Map::new())
            } else {
                serde_json::from_str(&call.function.arguments)?
            },
        },
        ContentPart::ToolCallResponse {
            tool_call_id,
            content,
            ..
        } => ConverseBlock::ToolResult {
            tool_use_id: tool_call_id.clone(),
            content: content.clone(),
        },
    };
    Ok(block)
}

/// Split messages into system blocks and alternating turns.
///
/// Roles map as for Anthropic. Every system chunk contributes its text
/// parts as separate system blocks.
fn process_input_messages(
    messages: &[BedrockMessage],
) -> Result<(Vec<String>, Vec<ConverseMessage>), BedrockError> {
    let mut system = Vec::new();
    let mut turns = Vec::new();
    for chunk in chunk_by_role(messages, anthropic_role)? {
        let role = match chunk.role {
            TurnRole::System => {
                for message in chunk.messages {
                    match &message.part {
                        ContentPart::Text { text } => system.push(text.clone()),
                        _ => return Err(BedrockError::SystemPromptNotText),
                    }
                }
                continue;
            }
            TurnRole::User => ConverseRole::User,
            TurnRole::Assistant => ConverseRole::Assistant,
        };

        let content = chunk
            .messages
            .iter()
            .map(|message| converse_block(&message.part))
            .collect::<Result<Vec<_>, _>>()?;
        turns.push(ConverseMessage { role, content });
    }
    Ok((system, turns))
}

fn convert_tool_choice(behavior: &FunctionCallBehavior) -> Result<ConverseToolChoice, BedrockError> {
    match behavior {
        FunctionCallBehavior::Auto => Ok(ConverseToolChoice::Auto),
        FunctionCallBehavior::Any => Ok(ConverseToolChoice::Any),
        FunctionCallBehavior::Named(name) => Ok(ConverseToolChoice::Tool(name.clone())),
        FunctionCallBehavior::None => Err(BedrockError::UnsupportedToolChoice("none".to_string())),
    }
}

pub(crate) fn build_request(
    messages: &[BedrockMessage],
    options: &CallOptions,
) -> Result<ConverseRequest, BedrockError> {
    let (system, messages) = process_input_messages(messages)?;

    let tool_config = match options.functions.as_deref() {
        Some(functions) if !functions.is_empty() => Some(ToolConfig {
            tools: functions.to_vec(),
            tool_choice: options
                .function_call_behavior
                .as_ref()
                .map(convert_tool_choice)
                .transpose()?,
        }),
        _ => None,
    };

    Ok(ConverseRequest {
        system,
        messages,
        inference_config: InferenceConfig {
            max_tokens: options.max_tokens.filter(|m| *m > 0),
            temperature: options.temperature,
            top_p: options.top_p.filter(|p| *p > 0.0),
            stop_sequences: options.stop_words.clone().unwrap_or_default(),
        },
        tool_config,
    })
}

pub(crate) fn decode_output(output: ConverseOutput) -> Result<ContentResponse, BedrockError> {
    let content = output
        .content
        .ok_or(BedrockError::EmptyResult("no output content"))?;

    let mut choice = ContentChoice {
        stop_reason: output.stop_reason,
        generation_info: HashMap::from([
            ("input_tokens".to_string(), Value::from(output.usage.input_tokens)),
            ("output_tokens".to_string(), Value::from(output.usage.output_tokens)),
            ("total_tokens".to_string(), Value::from(output.usage.total_tokens)),
            ("latency_ms".to_string(), Value::from(output.latency_ms)),
        ]),
        ..Default::default()
    };
    for block in content {
        match block {
            ConverseBlock::Text(text) => choice.content.push_str(&text),
            ConverseBlock::ToolUse { id, name, input } => {
                choice
                    .tool_calls
                    .push(ToolCall::new(id, name, serde_json::to_string(&input)?));
            }
            ConverseBlock::Image { .. } => {
                return Err(BedrockError::UnsupportedContent("image".to_string()))
            }
            ConverseBlock::ToolResult { .. } => {
                return Err(BedrockError::UnsupportedContent("tool_result".to_string()))
            }
        }
    }

    Ok(ContentResponse::new(vec![choice]))
}
