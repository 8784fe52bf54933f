//! [`BedrockTransport`] over the AWS SDK runtime client.

use async_trait::async_trait;
use aws_sdk_bedrockruntime::{
    error::DisplayErrorContext,
    primitives::Blob,
    types::{
        AnyToolChoice, AutoToolChoice, ContentBlock, ContentBlockDelta, ContentBlockStart,
        ConversationRole, ConverseOutput as ReplyOutput, ConverseStreamOutput, ImageBlock,
        ImageFormat as SdkImageFormat, ImageSource, InferenceConfiguration, Message,
        ResponseStream, SpecificToolChoice, SystemContentBlock, TokenUsage, Tool, ToolChoice,
        ToolConfiguration, ToolInputSchema, ToolResultBlock, ToolResultContentBlock,
        ToolResultStatus, ToolSpecification, ToolUseBlock,
    },
    Client,
};
use aws_smithy_types::{Document, Number};
use serde_json::{Map, Value};

use super::{
    converse::{
        ConverseBlock, ConverseEventStream, ConverseMessage, ConverseOutput, ConverseRequest,
        ConverseRole, ConverseToolChoice, ConverseUsage, ImageFormat, InferenceConfig,
        ToolConfig,
    },
    stream::{EventStream, StreamEvent},
    BedrockError, BedrockTransport,
};

/// Transport over the AWS SDK runtime client.
#[derive(Clone, Debug)]
pub struct AwsTransport {
    client: Client,
}

impl AwsTransport {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build a client from the environment's AWS configuration.
    pub async fn from_env() -> Self {
        let config = aws_config::load_from_env().await;
        Self::new(Client::new(&config))
    }
}

fn transport_error<E: std::error::Error>(err: E) -> BedrockError {
    BedrockError::Transport(DisplayErrorContext(err).to_string())
}

fn invalid_request<E: std::fmt::Display>(err: E) -> BedrockError {
    BedrockError::InvalidParameterError(err.to_string())
}

/// SDK counts are signed; negative values read as zero.
fn count<T: TryInto<u64>>(value: T) -> u64 {
    value.try_into().unwrap_or_default()
}

/// Converse request in SDK types.
struct SdkRequest {
    system: Vec<SystemContentBlock>,
    messages: Vec<Message>,
    inference_config: InferenceConfiguration,
    tool_config: Option<ToolConfiguration>,
}

impl TryFrom<ConverseRequest> for SdkRequest {
    type Error = BedrockError;

    fn try_from(request: ConverseRequest) -> Result<Self, Self::Error> {
        Ok(Self {
            system: request
                .system
                .into_iter()
                .map(SystemContentBlock::Text)
                .collect(),
            messages: request
                .messages
                .into_iter()
                .map(sdk_message)
                .collect::<Result<_, _>>()?,
            inference_config: inference_configuration(request.inference_config),
            tool_config: request.tool_config.map(tool_configuration).transpose()?,
        })
    }
}

fn sdk_message(message: ConverseMessage) -> Result<Message, BedrockError> {
    let role = match message.role {
        ConverseRole::User => ConversationRole::User,
        ConverseRole::Assistant => ConversationRole::Assistant,
    };
    let content = message
        .content
        .into_iter()
        .map(sdk_block)
        .collect::<Result<Vec<_>, _>>()?;
    Message::builder()
        .role(role)
        .set_content(Some(content))
        .build()
        .map_err(invalid_request)
}

fn sdk_block(block: ConverseBlock) -> Result<ContentBlock, BedrockError> {
    let block = match block {
        ConverseBlock::Text(text) => ContentBlock::Text(text),
        ConverseBlock::Image { format, bytes } => ContentBlock::Image(
            ImageBlock::builder()
                .format(sdk_image_format(format))
                .source(ImageSource::Bytes(Blob::new(bytes)))
                .build()
                .map_err(invalid_request)?,
        ),
        ConverseBlock::ToolUse { id, name, input } => ContentBlock::ToolUse(
            ToolUseBlock::builder()
                .tool_use_id(id)
                .name(name)
                .input(value_to_document(&input))
                .build()
                .map_err(invalid_request)?,
        ),
        ConverseBlock::ToolResult {
            tool_use_id,
            content,
        } => ContentBlock::ToolResult(
            ToolResultBlock::builder()
                .tool_use_id(tool_use_id)
                .content(ToolResultContentBlock::Text(content))
                .status(ToolResultStatus::Success)
                .build()
                .map_err(invalid_request)?,
        ),
    };
    Ok(block)
}

fn sdk_image_format(format: ImageFormat) -> SdkImageFormat {
    match format {
        ImageFormat::Png => SdkImageFormat::Png,
        ImageFormat::Jpeg => SdkImageFormat::Jpeg,
        ImageFormat::Gif => SdkImageFormat::Gif,
        ImageFormat::Webp => SdkImageFormat::Webp,
    }
}

fn inference_configuration(config: InferenceConfig) -> InferenceConfiguration {
    let stop_sequences = (!config.stop_sequences.is_empty()).then_some(config.stop_sequences);
    InferenceConfiguration::builder()
        .set_max_tokens(config.max_tokens.and_then(|m| i32::try_from(m).ok()))
        .set_temperature(config.temperature)
        .set_top_p(config.top_p)
        .set_stop_sequences(stop_sequences)
        .build()
}

fn tool_configuration(config: ToolConfig) -> Result<ToolConfiguration, BedrockError> {
    let tools = config
        .tools
        .iter()
        .map(|function| {
            ToolSpecification::builder()
                .name(&function.name)
                .set_description(
                    (!function.description.is_empty()).then(|| function.description.clone()),
                )
                .input_schema(ToolInputSchema::Json(value_to_document(&function.parameters)))
                .build()
                .map(Tool::ToolSpec)
                .map_err(invalid_request)
        })
        .collect::<Result<Vec<_>, _>>()?;

    let tool_choice = match config.tool_choice {
        None => None,
        Some(ConverseToolChoice::Auto) => Some(ToolChoice::Auto(AutoToolChoice::builder().build())),
        Some(ConverseToolChoice::Any) => Some(ToolChoice::Any(AnyToolChoice::builder().build())),
        Some(ConverseToolChoice::Tool(name)) => Some(ToolChoice::Tool(
            SpecificToolChoice::builder()
                .name(name)
                .build()
                .map_err(invalid_request)?,
        )),
    };

    ToolConfiguration::builder()
        .set_tools(Some(tools))
        .set_tool_choice(tool_choice)
        .build()
        .map_err(invalid_request)
}

fn reply_block(block: &ContentBlock) -> Result<ConverseBlock, BedrockError> {
    match block {
        ContentBlock::Text(text) => Ok(ConverseBlock::Text(text.clone())),
        ContentBlock::ToolUse(tool_use) => Ok(ConverseBlock::ToolUse {
            id: tool_use.tool_use_id().to_string(),
            name: tool_use.name().to_string(),
            input: document_to_value(tool_use.input()),
        }),
        ContentBlock::Image(_) => Err(BedrockError::UnsupportedContent("image".to_string())),
        ContentBlock::ToolResult(_) => {
            Err(BedrockError::UnsupportedContent("tool_result".to_string()))
        }
        _ => Err(BedrockError::UnsupportedContent("content block".to_string())),
    }
}

fn converse_usage(usage: &TokenUsage) -> ConverseUsage {
    ConverseUsage {
        input_tokens: count(usage.input_tokens()),
        output_tokens: count(usage.output_tokens()),
        total_tokens: count(usage.total_tokens()),
    }
}

fn stream_event(event: ConverseStreamOutput) -> StreamEvent {
    match event {
        ConverseStreamOutput::ContentBlockStart(start) => match start.start() {
            Some(ContentBlockStart::ToolUse(tool)) => StreamEvent::ToolUseStart {
                id: tool.tool_use_id().to_string(),
                name: tool.name().to_string(),
            },
            _ => StreamEvent::Ignored("contentBlockStart".to_string()),
        },
        ConverseStreamOutput::ContentBlockDelta(delta) => match delta.delta() {
            Some(ContentBlockDelta::Text(text)) => StreamEvent::TextDelta(text.clone()),
            Some(ContentBlockDelta::ToolUse(tool)) => {
                StreamEvent::ToolInputDelta(tool.input().to_string())
            }
            _ => StreamEvent::Ignored("contentBlockDelta".to_string()),
        },
        ConverseStreamOutput::MessageStop(stop) => StreamEvent::MessageDelta {
            stop_reason: Some(stop.stop_reason().as_str().to_string()),
            output_tokens: None,
        },
        ConverseStreamOutput::Metadata(metadata) => {
            let usage = metadata.usage().map(converse_usage).unwrap_or_default();
            StreamEvent::Metadata {
                input_tokens: usage.input_tokens,
                output_tokens: usage.output_tokens,
                total_tokens: usage.total_tokens,
                latency_ms: metadata
                    .metrics()
                    .map(|metrics| count(metrics.latency_ms()))
                    .unwrap_or_default(),
            }
        }
        ConverseStreamOutput::MessageStart(_) => StreamEvent::Ignored("messageStart".to_string()),
        ConverseStreamOutput::ContentBlockStop(_) => {
            StreamEvent::Ignored("contentBlockStop".to_string())
        }
        other => StreamEvent::Ignored(format!("{:?}", other)),
    }
}

fn value_to_document(value: &Value) -> Document {
    match value {
        Value::Null => Document::Null,
        Value::Bool(b) => Document::Bool(*b),
        Value::Number(n) => {
            if let Some(u) = n.as_u64() {
                Document::Number(Number::PosInt(u))
            } else if let Some(i) = n.as_i64() {
                Document::Number(Number::NegInt(i))
            } else {
                n.as_f64()
                    .map_or(Document::Null, |f| Document::Number(Number::Float(f)))
            }
        }
        Value::String(s) => Document::String(s.clone()),
        Value::Array(items) => Document::Array(items.iter().map(value_to_document).collect()),
        Value::Object(map) => Document::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), value_to_document(v)))
                .collect(),
        ),
    }
}

fn document_to_value(document: &Document) -> Value {
    match document {
        Document::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), document_to_value(v)))
                .collect::<Map<_, _>>(),
        ),
        Document::Array(items) => Value::Array(items.iter().map(document_to_value).collect()),
        Document::Number(Number::PosInt(u)) => Value::from(*u),
        Document::Number(Number::NegInt(i)) => Value::from(*i),
        Document::Number(Number::Float(f)) => {
            serde_json::Number::from_f64(*f).map_or(Value::Null, Value::Number)
        }
        Document::String(s) => Value::String(s.clone()),
        Document::Bool(b) => Value::Bool(*b),
        Document::Null => Value::Null,
    }
}

#[async_trait]
impl BedrockTransport for AwsTransport {
    async fn invoke(&self, model_id: &str, body: Vec<u8>) -> Result<Vec<u8>, BedrockError> {
        let response = self
            .client
            .invoke_model()
            .model_id(model_id)
            .accept("*/*")
            .content_type("application/json")
            .body(Blob::new(body))
            .send()
            .await
            .map_err(transport_error)?;

        Ok(response.body.into_inner())
    }

    async fn invoke_streaming(
        &self,
        model_id: &str,
        body: Vec<u8>,
    ) -> Result<EventStream, BedrockError> {
        let mut response = self
            .client
            .invoke_model_with_response_stream()
            .model_id(model_id)
            .accept("*/*")
            .content_type("application/json")
            .body(Blob::new(body))
            .send()
            .await
            .map_err(transport_error)?;

        let stream = async_stream::stream! {
            loop {
                match response.body.recv().await {
                    Ok(Some(ResponseStream::Chunk(chunk))) => {
                        if let Some(bytes) = chunk.bytes {
                            yield Ok(bytes.into_inner());
                        }
                    }
                    Ok(Some(other)) => log::debug!("ignoring response stream event {:?}", other),
                    Ok(None) => break,
                    Err(err) => {
                        yield Err(transport_error(err));
                        break;
                    }
                }
            }
        };

        Ok(Box::pin(stream))
    }

    async fn converse(
        &self,
        model_id: &str,
        request: ConverseRequest,
    ) -> Result<ConverseOutput, BedrockError> {
        let request = SdkRequest::try_from(request)?;
        let output = self
            .client
            .converse()
            .model_id(model_id)
            .set_system(Some(request.system))
            .set_messages(Some(request.messages))
            .inference_config(request.inference_config)
            .set_tool_config(request.tool_config)
            .send()
            .await
            .map_err(transport_error)?;

        let content = match output.output() {
            Some(ReplyOutput::Message(message)) => Some(
                message
                    .content()
                    .iter()
                    .map(reply_block)
                    .collect::<Result<Vec<_>, _>>()?,
            ),
            Some(_) => Some(Vec::new()),
            None => None,
        };

        Ok(ConverseOutput {
            content,
            stop_reason: output.stop_reason().as_str().to_string(),
            usage: output.usage().map(converse_usage).unwrap_or_default(),
            latency_ms: output
                .metrics()
                .map(|metrics| count(metrics.latency_ms()))
                .unwrap_or_default(),
        })
    }

    async fn converse_stream(
        &self,
        model_id: &str,
        request: ConverseRequest,
    ) -> Result<ConverseEventStream, BedrockError> {
        let request = SdkRequest::try_from(request)?;
        let output = self
            .client
            .converse_stream()
            .model_id(model_id)
            .set_system(Some(request.system))
            .set_messages(Some(request.messages))
            .inference_config(request.inference_config)
            .set_tool_config(request.tool_config)
            .send()
            .await
            .map_err(transport_error)?;

        let mut receiver = output.stream;
        let stream = async_stream::stream! {
            loop {
                match receiver.recv().await {
                    Ok(Some(event)) => yield Ok(stream_event(event)),
                    Ok(None) => break,
                    Err(err) => {
                        yield Err(transport_error(err));
                        break;
                    }
                }
            }
        };

        Ok(Box::pin(stream))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_document_round_trip_keeps_integers() {
        let value = json!({"city": "Paris", "days": 3, "offset": -2, "ratio": 0.5, "tags": [true, null]});
        assert_eq!(document_to_value(&value_to_document(&value)), value);
    }

    #[test]
    fn test_tool_configuration_with_named_choice() {
        let config = tool_configuration(ToolConfig {
            tools: vec![crate::schemas::FunctionDefinition::new(
                "get_weather",
                "Current weather",
                json!({"type": "object"}),
            )],
            tool_choice: Some(ConverseToolChoice::Tool("get_weather".to_string())),
        })
        .unwrap();

        assert_eq!(config.tools().len(), 1);
        assert!(matches!(config.tool_choice(), Some(ToolChoice::Tool(choice)) if choice.name() == "get_weather"));
    }
}
