//! Anthropic Claude messages API on Bedrock.
//!
//! Ref: <https://docs.aws.amazon.com/bedrock/latest/userguide/model-parameters-anthropic-claude-messages.html>

use std::collections::HashMap;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::{
    language_models::options::CallOptions,
    schemas::{
        ContentChoice, ContentPart, ContentResponse, FunctionCallBehavior, FunctionDefinition,
        MessageType, ToolCall,
    },
};

use super::{
    models::{chunk_by_role, BedrockMessage, TurnRole},
    BedrockError,
};

pub const ANTHROPIC_VERSION: &str = "bedrock-2023-05-31";

/// Stop reasons that mean the model finished on its own terms.
const TERMINAL_STOP_REASONS: [&str; 3] = ["end_turn", "stop_sequence", "tool_use"];

#[derive(Debug, Serialize)]
struct AnthropicRequest {
    anthropic_version: &'static str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "String::is_empty")]
    system: String,
    messages: Vec<AnthropicMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_k: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop_sequences: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<AnthropicTool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<Value>,
}

#[derive(Debug, Serialize, PartialEq)]
pub(crate) struct AnthropicMessage {
    role: &'static str,
    content: Vec<AnthropicInputContent>,
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
enum AnthropicInputContent {
    Text {
        text: String,
    },
    Image {
        source: AnthropicImageSource,
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

#[derive(Debug, Serialize, PartialEq)]
struct AnthropicImageSource {
    #[serde(rename = "type")]
    source_type: &'static str,
    media_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
struct AnthropicTool {
    name: String,
    description: String,
    input_schema: Value,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    #[serde(default)]
    content: Vec<AnthropicOutputContent>,
    /// One of `end_turn`, `max_tokens`, `stop_sequence`, `tool_use`.
    #[serde(default)]
    stop_reason: String,
    #[serde(default)]
    usage: AnthropicUsage,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum AnthropicOutputContent {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        #[serde(default)]
        input: Value,
    },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Default, Deserialize)]
struct AnthropicUsage {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
}

pub(crate) fn anthropic_role(role: Option<MessageType>) -> Result<TurnRole, BedrockError> {
    match role {
        Some(MessageType::SystemMessage) => Ok(TurnRole::System),
        Some(MessageType::AIMessage) => Ok(TurnRole::Assistant),
        Some(MessageType::HumanMessage) | Some(MessageType::GenericMessage) => Ok(TurnRole::User),
        // Tool results travel back to the model in the user turn
        Some(MessageType::ToolMessage) | Some(MessageType::FunctionMessage) => Ok(TurnRole::User),
        None => Err(BedrockError::RoleNotSupported("<none>".to_string())),
    }
}

fn input_content(part: &ContentPart) -> AnthropicInputContent {
    match part {
        ContentPart::Text { text } => AnthropicInputContent::Text { text: text.clone() },
        ContentPart::Binary { mime_type, data } => AnthropicInputContent::Image {
            source: AnthropicImageSource {
                source_type: "base64",
                media_type: mime_type.clone(),
                data: STANDARD.encode(data),
            },
        },
        ContentPart::ToolCall(call) => AnthropicInputContent::ToolUse {
            id: call.id.clone(),
            name: call.function.name.clone(),
            input: tool_input(&call.function.arguments),
        },
        ContentPart::ToolCallResponse {
            tool_call_id,
            content,
            ..
        } => AnthropicInputContent::ToolResult {
            tool_use_id: tool_call_id.clone(),
            content: content.clone(),
        },
    }
}

/// Tool arguments as a JSON object; unparseable text is wrapped as
/// `{"arguments": raw}`.
fn tool_input(arguments: &str) -> Value {
    if arguments.is_empty() {
        return Value::Object(Map::new());
    }
    match serde_json::from_str::<Value>(arguments) {
        Ok(value @ Value::Object(_)) => value,
        _ => json!({ "arguments": arguments }),
    }
}

/// Split messages into alternating turns and one system prompt.
pub(crate) fn process_input_messages(
    messages: &[BedrockMessage],
) -> Result<(Vec<AnthropicMessage>, String), BedrockError> {
    let chunks = chunk_by_role(messages, anthropic_role)?;

    let mut turns = Vec::with_capacity(chunks.len());
    let mut system_prompt = String::new();
    let mut seen_system = false;
    for chunk in chunks {
        if chunk.role == TurnRole::System {
            if seen_system {
                return Err(BedrockError::MultipleSystemPrompts);
            }
            seen_system = true;
            for message in chunk.messages {
                match &message.part {
                    ContentPart::Text { text } => system_prompt.push_str(text),
                    _ => return Err(BedrockError::SystemPromptNotText),
                }
            }
            continue;
        }

        turns.push(AnthropicMessage {
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

fn convert_tools(functions: &[FunctionDefinition]) -> Vec<AnthropicTool> {
    functions
        .iter()
        .map(|function| AnthropicTool {
            name: function.name.clone(),
            description: function.description.clone(),
            input_schema: function.parameters.clone(),
        })
        .collect()
}

fn convert_tool_choice(behavior: &FunctionCallBehavior) -> Result<Value, BedrockError> {
    match behavior {
        FunctionCallBehavior::Auto => Ok(json!({"type": "auto"})),
        FunctionCallBehavior::Any => Ok(json!({"type": "any"})),
        FunctionCallBehavior::Named(name) => Ok(json!({"type": "tool", "name": name})),
        FunctionCallBehavior::None => {
            Err(BedrockError::UnsupportedToolChoice("none".to_string()))
        }
    }
}

pub(crate) fn encode_request(
    messages: &[BedrockMessage],
    options: &CallOptions,
) -> Result<Vec<u8>, BedrockError> {
    let max_tokens = options.max_tokens.filter(|m| *m > 0).ok_or_else(|| {
        BedrockError::InvalidParameterError("max_tokens is required for anthropic models".into())
    })?;

    let (turns, system) = process_input_messages(messages)?;
    if turns.is_empty() {
        return Err(BedrockError::InvalidParameterError(
            "at least one non-system message is required".into(),
        ));
    }

    let functions = options.functions.as_deref().unwrap_or_default();
    let tool_choice = match (&options.function_call_behavior, functions.is_empty()) {
        (Some(behavior), false) => Some(convert_tool_choice(behavior)?),
        _ => None,
    };

    let request = AnthropicRequest {
        anthropic_version: ANTHROPIC_VERSION,
        max_tokens,
        system,
        messages: turns,
        temperature: options.temperature,
        top_p: options.top_p,
        top_k: options.top_k,
        stop_sequences: options.stop_words.clone(),
        tools: convert_tools(functions),
        tool_choice,
    };
    Ok(serde_json::to_vec(&request)?)
}

pub(crate) fn decode_response(body: &[u8]) -> Result<ContentResponse, BedrockError> {
    let output: AnthropicResponse = serde_json::from_slice(body)?;
    if output.content.is_empty() {
        return Err(BedrockError::EmptyResult("no results"));
    }
    if !TERMINAL_STOP_REASONS.contains(&output.stop_reason.as_str()) {
        return Err(BedrockError::IncompleteGeneration(output.stop_reason));
    }

    let mut choice = ContentChoice {
        stop_reason: output.stop_reason,
        generation_info: HashMap::from([
            (
                "input_tokens".to_string(),
                Value::from(output.usage.input_tokens),
            ),
            (
                "output_tokens".to_string(),
                Value::from(output.usage.output_tokens),
            ),
        ]),
        ..Default::default()
    };
    for block in output.content {
        match block {
            AnthropicOutputContent::Text { text } => choice.content.push_str(&text),
            AnthropicOutputContent::ToolUse { id, name, input } => {
                choice
                    .tool_calls
                    .push(ToolCall::new(id, name, serde_json::to_string(&input)?));
            }
            AnthropicOutputContent::Unknown => {
                log::debug!("skipping unknown anthropic content block");
            }
        }
    }

    Ok(ContentResponse::new(vec![choice]))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(role: MessageType, text: &str) -> BedrockMessage {
        BedrockMessage::text(Some(role), text)
    }

    fn encode(messages: &[BedrockMessage], options: &CallOptions) -> Value {
        serde_json::from_slice(&encode_request(messages, options).unwrap()).unwrap()
    }

    #[test]
    fn test_process_input_messages_merges_turns_and_extracts_system() {
        let messages = [
            msg(MessageType::SystemMessage, "You are "),
            msg(MessageType::SystemMessage, "helpful."),
            msg(MessageType::HumanMessage, "Hi"),
            msg(MessageType::GenericMessage, "there"),
            msg(MessageType::AIMessage, "Hello"),
        ];
        let (turns, system) = process_input_messages(&messages).unwrap();

        assert_eq!(system, "You are helpful.");
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].role, "user");
        assert_eq!(turns[0].content.len(), 2);
        assert_eq!(turns[1].role, "assistant");
    }

    #[test]
    fn test_multiple_system_prompts_is_error() {
        let messages = [
            msg(MessageType::SystemMessage, "one"),
            msg(MessageType::HumanMessage, "Hi"),
            msg(MessageType::SystemMessage, "two"),
        ];
        assert!(matches!(
            process_input_messages(&messages),
            Err(BedrockError::MultipleSystemPrompts)
        ));
    }

    #[test]
    fn test_system_prompt_must_be_text() {
        let messages = [BedrockMessage::new(
            Some(MessageType::SystemMessage),
            ContentPart::binary("image/png", vec![1]),
        )];
        assert!(matches!(
            process_input_messages(&messages),
            Err(BedrockError::SystemPromptNotText)
        ));
    }

    #[test]
    fn test_message_without_role_is_rejected() {
        let messages = [BedrockMessage::text(None, "orphan")];
        assert!(matches!(
            process_input_messages(&messages),
            Err(BedrockError::RoleNotSupported(_))
        ));
    }

    #[test]
    fn test_encode_request_requires_max_tokens() {
        let messages = [msg(MessageType::HumanMessage, "Hi")];
        let err = encode_request(&messages, &CallOptions::new()).unwrap_err();
        assert!(matches!(err, BedrockError::InvalidParameterError(_)));
    }

    #[test]
    fn test_encode_request_requires_a_turn() {
        let messages = [msg(MessageType::SystemMessage, "only system")];
        let err = encode_request(&messages, &CallOptions::new().with_max_tokens(10)).unwrap_err();
        assert!(matches!(err, BedrockError::InvalidParameterError(_)));
    }

    #[test]
    fn test_encode_request_body() {
        let messages = [
            msg(MessageType::SystemMessage, "Be terse."),
            msg(MessageType::HumanMessage, "Hi"),
        ];
        let body = encode(&messages, &CallOptions::new().with_max_tokens(256).with_top_k(5));

        assert_eq!(
            body,
            json!({
                "anthropic_version": "bedrock-2023-05-31",
                "max_tokens": 256,
                "system": "Be terse.",
                "messages": [{"role": "user", "content": [{"type": "text", "text": "Hi"}]}],
                "top_k": 5
            })
        );
    }

    #[test]
    fn test_encode_image_and_tool_parts() {
        let messages = [
            BedrockMessage::new(
                Some(MessageType::HumanMessage),
                ContentPart::binary("image/png", b"abc".to_vec()),
            ),
            BedrockMessage::new(
                Some(MessageType::AIMessage),
                ContentPart::ToolCall(ToolCall::new("t1", "get_weather", r#"{"city":"Paris"}"#)),
            ),
            BedrockMessage::new(
                Some(MessageType::ToolMessage),
                ContentPart::ToolCallResponse {
                    tool_call_id: "t1".to_string(),
                    name: "get_weather".to_string(),
                    content: "sunny".to_string(),
                },
            ),
        ];
        let body = encode(&messages, &CallOptions::new().with_max_tokens(10));

        assert_eq!(
            body["messages"],
            json!([
                {"role": "user", "content": [
                    {"type": "image", "source": {"type": "base64", "media_type": "image/png", "data": "YWJj"}}
                ]},
                {"role": "assistant", "content": [
                    {"type": "tool_use", "id": "t1", "name": "get_weather", "input": {"city": "Paris"}}
                ]},
                {"role": "user", "content": [
                    {"type": "tool_result", "tool_use_id": "t1", "content": "sunny"}
                ]}
            ])
        );
    }

    #[test]
    fn test_tool_input_fallbacks() {
        assert_eq!(tool_input(""), json!({}));
        assert_eq!(tool_input("not json"), json!({"arguments": "not json"}));
        assert_eq!(tool_input("[1]"), json!({"arguments": "[1]"}));
    }

    #[test]
    fn test_encode_tools_and_choice() {
        let options = CallOptions::new()
            .with_max_tokens(10)
            .with_functions(vec![FunctionDefinition::new(
                "get_weather",
                "Weather for a city",
                json!({"type": "object"}),
            )])
            .with_function_call_behavior(FunctionCallBehavior::Named("get_weather".into()));
        let body = encode(&[msg(MessageType::HumanMessage, "Hi")], &options);

        assert_eq!(
            body["tools"],
            json!([{"name": "get_weather", "description": "Weather for a city", "input_schema": {"type": "object"}}])
        );
        assert_eq!(body["tool_choice"], json!({"type": "tool", "name": "get_weather"}));
    }

    #[test]
    fn test_tool_choice_none_is_configuration_error() {
        let options = CallOptions::new()
            .with_max_tokens(10)
            .with_functions(vec![FunctionDefinition::new("f", "", json!({}))])
            .with_function_call_behavior(FunctionCallBehavior::None);
        let err = encode_request(&[msg(MessageType::HumanMessage, "Hi")], &options).unwrap_err();
        assert!(matches!(err, BedrockError::UnsupportedToolChoice(_)));
    }

    #[test]
    fn test_decode_text_and_tool_use() {
        let body = json!({
            "type": "message",
            "role": "assistant",
            "content": [
                {"type": "text", "text": "Let me check. "},
                {"type": "tool_use", "id": "toolu_1", "name": "get_weather", "input": {"city": "Paris"}}
            ],
            "stop_reason": "tool_use",
            "usage": {"input_tokens": 12, "output_tokens": 30}
        });
        let response = decode_response(body.to_string().as_bytes()).unwrap();

        let choice = response.first().unwrap();
        assert_eq!(choice.content, "Let me check. ");
        assert_eq!(choice.stop_reason, "tool_use");
        assert_eq!(
            choice.tool_calls,
            vec![ToolCall::new("toolu_1", "get_weather", r#"{"city":"Paris"}"#)]
        );
        assert_eq!(choice.generation_info["input_tokens"], json!(12));
    }

    #[test]
    fn test_decode_empty_content() {
        let body = json!({"content": [], "stop_reason": "end_turn"});
        let err = decode_response(body.to_string().as_bytes()).unwrap_err();
        assert!(matches!(err, BedrockError::EmptyResult("no results")));
    }

    #[test]
    fn test_decode_max_tokens_is_actionable_error() {
        let body = json!({"content": [{"type": "text", "text": "truncat"}], "stop_reason": "max_tokens"});
        let err = decode_response(body.to_string().as_bytes()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "completed due to max_tokens. Maybe try increasing max tokens"
        );
    }
}
