//! Amazon Nova messages API on Bedrock.
//!
//! Ref: <https://docs.aws.amazon.com/nova/latest/userguide/complete-request-schema.html>

use std::collections::HashMap;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    language_models::options::CallOptions,
    schemas::{ContentChoice, ContentPart, ContentResponse, MessageType},
};

use super::{
    models::{chunk_by_role, BedrockMessage, TurnRole},
    BedrockError,
};

const TERMINAL_STOP_REASONS: [&str; 2] = ["end_turn", "stop_sequence"];

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct NovaRequest {
    messages: Vec<NovaMessage>,
    inference_config: NovaInferenceConfig,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    system: Vec<NovaSystemPrompt>,
}

#[derive(Debug, Serialize, PartialEq)]
pub(crate) struct NovaMessage {
    role: &'static str,
    content: Vec<NovaContent>,
}

/// A content block. Exactly one field is set; an unsupported part is sent
/// as an empty block.
#[derive(Debug, Default, Serialize, PartialEq)]
struct NovaContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    image: Option<NovaImage>,
}

#[derive(Debug, Serialize, PartialEq)]
struct NovaImage {
    format: &'static str,
    source: NovaImageSource,
}

#[derive(Debug, Serialize, PartialEq)]
struct NovaImageSource {
    bytes: String,
}

#[derive(Debug, Serialize)]
struct NovaSystemPrompt {
    text: String,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
struct NovaInferenceConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop_sequences: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NovaResponse {
    output: NovaOutput,
    #[serde(default)]
    stop_reason: String,
    #[serde(default)]
    usage: NovaUsage,
}

#[derive(Debug, Deserialize)]
struct NovaOutput {
    message: NovaOutputMessage,
}

#[derive(Debug, Deserialize)]
struct NovaOutputMessage {
    #[serde(default)]
    content: Vec<NovaOutputContent>,
}

#[derive(Debug, Deserialize)]
struct NovaOutputContent {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NovaUsage {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
}

fn nova_role(role: Option<MessageType>) -> Result<TurnRole, BedrockError> {
    match role {
        Some(MessageType::SystemMessage) => Ok(TurnRole::System),
        Some(MessageType::AIMessage) => Ok(TurnRole::Assistant),
        Some(MessageType::HumanMessage) | Some(MessageType::GenericMessage) => Ok(TurnRole::User),
        Some(other) => Err(BedrockError::RoleNotSupported(other.to_string())),
        None => Err(BedrockError::RoleNotSupported("<none>".to_string())),
    }
}

fn mime_type_to_format(mime_type: &str) -> &'static str {
    match mime_type {
        "image/jpeg" => "jpeg",
        "image/png" => "png",
        "image/webp" => "webp",
        _ => "",
    }
}

fn input_content(part: &ContentPart) -> NovaContent {
    match part {
        ContentPart::Text { text } => NovaContent {
            text: Some(text.clone()),
            ..Default::default()
        },
        ContentPart::Binary { mime_type, data } => NovaContent {
            image: Some(NovaImage {
                format: mime_type_to_format(mime_type),
                source: NovaImageSource {
                    bytes: STANDARD.encode(data),
                },
            }),
            ..Default::default()
        },
        other => {
            log::warn!("nova does not accept {} content, sending empty block", other.kind());
            NovaContent::default()
        }
    }
}

/// Split messages into alternating turns and the system prompt.
///
/// Every system chunk is appended to the one system prompt.
pub(crate) fn process_input_messages(
    messages: &[BedrockMessage],
) -> Result<(Vec<NovaMessage>, String), BedrockError> {
    let chunks = chunk_by_role(messages, nova_role)?;

    let mut turns = Vec::with_capacity(chunks.len());
    let mut system_prompt = String::new();
    for chunk in chunks {
        if chunk.role == TurnRole::System {
            for message in chunk.messages {
                if let Some(text) = input_content(&message.part).text {
                    system_prompt.push_str(&text);
                }
            }
            continue;
        }

        turns.push(NovaMessage {
            role: chunk.role.as_str(),
            content: chunk
                .messages
                .iter()
                .map(|message| input_content(&message.part))
                .collect(),
        });
    }
    Ok((turns, system_prompt))
}

pub(crate) fn encode_request(
    messages: &[BedrockMessage],
    options: &CallOptions,
) -> Result<Vec<u8>, BedrockError> {
    let (turns, system_prompt) = process_input_messages(messages)?;

    let system = if system_prompt.is_empty() {
        Vec::new()
    } else {
        vec![NovaSystemPrompt {
            text: system_prompt,
        }]
    };
    let request = NovaRequest {
        messages: turns,
        inference_config: NovaInferenceConfig {
            max_tokens: options.max_tokens.filter(|m| *m > 0),
            top_p: options.top_p,
            temperature: options.temperature,
            stop_sequences: options.stop_words.clone(),
        },
        system,
    };
    Ok(serde_json::to_vec(&request)?)
}

/// One choice per output content block, all sharing stop reason and usage.
pub(crate) fn decode_response(body: &[u8]) -> Result<ContentResponse, BedrockError> {
    let output: NovaResponse = serde_json::from_slice(body)?;
    let content = output.output.message.content;
    if content.is_empty() {
        return Err(BedrockError::EmptyResult("no results"));
    }
    if !TERMINAL_STOP_REASONS.contains(&output.stop_reason.as_str()) {
        return Err(BedrockError::IncompleteGeneration(output.stop_reason));
    }

    let generation_info = HashMap::from([
        (
            "input_tokens".to_string(),
            Value::from(output.usage.input_tokens),
        ),
        (
            "output_tokens".to_string(),
            Value::from(output.usage.output_tokens),
        ),
    ]);
    let choices = content
        .into_iter()
        .map(|block| ContentChoice {
            content: block.text,
            stop_reason: output.stop_reason.clone(),
            tool_calls: Vec::new(),
            generation_info: generation_info.clone(),
        })
        .collect();

    Ok(ContentResponse::new(choices))
}
