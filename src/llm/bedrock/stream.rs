//! Incremental decoding of the invoke-with-response-stream event sequence.
//!
//! Each event is one JSON frame. Anthropic frames carry a `type` tag
//! (`message_start`, `content_block_delta`, ...); Nova frames are keyed by
//! event name in camelCase (`messageStart`, `contentBlockDelta`, ...). Both
//! are reduced to [`StreamEvent`] and folded into a single [`ContentChoice`].
//! Converse streams arrive already decoded and go through the same fold.

use std::pin::Pin;

use futures::{Stream, StreamExt};
use serde::Deserialize;
use serde_json::Value;

use crate::{
    language_models::options::StreamingFunc,
    schemas::{ContentChoice, ContentResponse, FunctionCall, ToolCall},
};

use super::{converse::ConverseEventStream, BedrockError};

/// Raw event frames from the transport. Dropping the stream closes it.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>, BedrockError>> + Send>>;

/// A decoded stream frame.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    MessageStart {
        input_tokens: Option<u64>,
    },
    ToolUseStart {
        id: String,
        name: String,
    },
    TextDelta(String),
    ToolInputDelta(String),
    MessageDelta {
        stop_reason: Option<String>,
        output_tokens: Option<u64>,
    },
    /// Token totals reported at the end of the stream. They only fill
    /// counts that earlier events did not provide.
    Usage {
        input_tokens: u64,
        output_tokens: u64,
    },
    /// Converse trailer. Replaces every count seen so far.
    Metadata {
        input_tokens: u64,
        output_tokens: u64,
        total_tokens: u64,
        latency_ms: u64,
    },
    Ignored(String),
}

#[derive(Debug, Deserialize)]
struct AnthropicMessageStart {
    message: AnthropicStartMessage,
}

#[derive(Debug, Deserialize)]
struct AnthropicStartMessage {
    #[serde(default)]
    usage: Option<AnthropicUsage>,
}

#[derive(Debug, Default, Deserialize)]
struct AnthropicUsage {
    input_tokens: Option<u64>,
    output_tokens: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct AnthropicBlockStart {
    content_block: AnthropicStartBlock,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum AnthropicStartBlock {
    ToolUse {
        id: String,
        name: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct AnthropicBlockDelta {
    delta: AnthropicDelta,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum AnthropicDelta {
    TextDelta {
        text: String,
    },
    InputJsonDelta {
        partial_json: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct AnthropicMessageDelta {
    delta: AnthropicStopDelta,
    #[serde(default)]
    usage: Option<AnthropicUsage>,
}

#[derive(Debug, Deserialize)]
struct AnthropicStopDelta {
    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AnthropicMessageStop {
    #[serde(rename = "amazon-bedrock-invocationMetrics", default)]
    metrics: Option<InvocationMetrics>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InvocationMetrics {
    #[serde(default)]
    input_token_count: u64,
    #[serde(default)]
    output_token_count: u64,
}

#[derive(Debug, Deserialize)]
struct NovaBlockStart {
    start: NovaStart,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NovaStart {
    #[serde(default)]
    tool_use: Option<NovaToolUseStart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NovaToolUseStart {
    tool_use_id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct NovaBlockDelta {
    delta: NovaDelta,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NovaDelta {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    tool_use: Option<NovaToolUseDelta>,
}

#[derive(Debug, Deserialize)]
struct NovaToolUseDelta {
    input: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NovaMessageStop {
    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NovaMetadata {
    usage: NovaUsage,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NovaUsage {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
}

/// Decode one raw frame.
pub fn decode_event(bytes: &[u8]) -> Result<StreamEvent, BedrockError> {
    let frame: Value = serde_json::from_slice(bytes)?;

    if let Some(kind) = frame.get("type").and_then(Value::as_str).map(str::to_owned) {
        return decode_anthropic_event(&kind, frame);
    }

    // Nova frames may carry an invocation-metrics trailer next to the event key
    let Value::Object(object) = frame else {
        return Ok(StreamEvent::Ignored(String::new()));
    };
    let mut unknown = String::new();
    for (kind, body) in object {
        if NOVA_EVENT_KINDS.contains(&kind.as_str()) {
            return decode_nova_event(&kind, body);
        }
        if unknown.is_empty() {
            unknown = kind;
        }
    }
    Ok(StreamEvent::Ignored(unknown))
}

const NOVA_EVENT_KINDS: [&str; 6] = [
    "messageStart",
    "contentBlockStart",
    "contentBlockDelta",
    "contentBlockStop",
    "messageStop",
    "metadata",
];

fn decode_anthropic_event(kind: &str, frame: Value) -> Result<StreamEvent, BedrockError> {
    let event = match kind {
        "message_start" => {
            let start: AnthropicMessageStart = serde_json::from_value(frame)?;
            StreamEvent::MessageStart {
                input_tokens: start.message.usage.unwrap_or_default().input_tokens,
            }
        }
        "content_block_start" => match serde_json::from_value::<AnthropicBlockStart>(frame)? {
            AnthropicBlockStart {
                content_block: AnthropicStartBlock::ToolUse { id, name },
            } => StreamEvent::ToolUseStart { id, name },
            _ => StreamEvent::Ignored(kind.to_string()),
        },
        "content_block_delta" => match serde_json::from_value::<AnthropicBlockDelta>(frame)?.delta {
            AnthropicDelta::TextDelta { text } => StreamEvent::TextDelta(text),
            AnthropicDelta::InputJsonDelta { partial_json } => {
                StreamEvent::ToolInputDelta(partial_json)
            }
            AnthropicDelta::Other => StreamEvent::Ignored(kind.to_string()),
        },
        "message_delta" => {
            let delta: AnthropicMessageDelta = serde_json::from_value(frame)?;
            StreamEvent::MessageDelta {
                stop_reason: delta.delta.stop_reason,
                output_tokens: delta.usage.unwrap_or_default().output_tokens,
            }
        }
        "message_stop" => match serde_json::from_value::<AnthropicMessageStop>(frame)?.metrics {
            Some(metrics) => StreamEvent::Usage {
                input_tokens: metrics.input_token_count,
                output_tokens: metrics.output_token_count,
            },
            None => StreamEvent::Ignored(kind.to_string()),
        },
        _ => StreamEvent::Ignored(kind.to_string()),
    };
    Ok(event)
}

fn decode_nova_event(kind: &str, body: Value) -> Result<StreamEvent, BedrockError> {
    let event = match kind {
        "messageStart" => StreamEvent::MessageStart { input_tokens: None },
        "contentBlockStart" => match serde_json::from_value::<NovaBlockStart>(body)?.start.tool_use {
            Some(tool_use) => StreamEvent::ToolUseStart {
                id: tool_use.tool_use_id,
                name: tool_use.name,
            },
            None => StreamEvent::Ignored(kind.to_string()),
        },
        "contentBlockDelta" => {
            let delta = serde_json::from_value::<NovaBlockDelta>(body)?.delta;
            match (delta.text, delta.tool_use) {
                (Some(text), _) => StreamEvent::TextDelta(text),
                (None, Some(tool_use)) => StreamEvent::ToolInputDelta(tool_use.input),
                (None, None) => StreamEvent::Ignored(kind.to_string()),
            }
        }
        "messageStop" => StreamEvent::MessageDelta {
            stop_reason: serde_json::from_value::<NovaMessageStop>(body)?.stop_reason,
            output_tokens: None,
        },
        "metadata" => {
            let usage = serde_json::from_value::<NovaMetadata>(body)?.usage;
            StreamEvent::Usage {
                input_tokens: usage.input_tokens,
                output_tokens: usage.output_tokens,
            }
        }
        _ => StreamEvent::Ignored(kind.to_string()),
    };
    Ok(event)
}

/// Builds tool calls from start events and argument fragments.
///
/// A start opens a new call unless it repeats the id of the last one.
/// Arguments may arrive before their start event; they are collected in a
/// placeholder call with an empty id, which the next start fills in.
#[derive(Debug, Default, Clone)]
pub struct ToolCallAccumulator {
    tool_calls: Vec<ToolCall>,
}

impl ToolCallAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` when the start repeats the last call and changes nothing.
    pub fn start(&mut self, id: &str, name: &str) -> bool {
        match self.tool_calls.last_mut() {
            Some(last) if last.id.is_empty() => {
                last.id = id.to_string();
                last.function.name = name.to_string();
            }
            Some(last) if last.id == id => return false,
            _ => self.tool_calls.push(ToolCall::new(id, name, "")),
        }
        true
    }

    pub fn append_args(&mut self, fragment: &str) {
        if fragment.is_empty() {
            return;
        }
        if self.tool_calls.is_empty() {
            self.tool_calls.push(ToolCall::new("", "", ""));
        }
        if let Some(last) = self.tool_calls.last_mut() {
            last.function.arguments.push_str(fragment);
        }
    }

    pub fn tool_calls(&self) -> &[ToolCall] {
        &self.tool_calls
    }

    pub fn into_tool_calls(self) -> Vec<ToolCall> {
        self.tool_calls
    }
}

/// Running state of one streamed response.
#[derive(Debug, Default)]
struct StreamState {
    choice: ContentChoice,
    tool_calls: ToolCallAccumulator,
    /// Also forward tool-call events to the callback, as JSON arrays.
    forward_tool_calls: bool,
}

impl StreamState {
    /// Fold an event into the state, returning the chunk to forward to the
    /// streaming callback.
    fn apply(&mut self, event: StreamEvent) -> Result<Option<String>, BedrockError> {
        match event {
            StreamEvent::MessageStart { input_tokens } => {
                if let Some(tokens) = input_tokens {
                    self.set_tokens("input_tokens", tokens);
                }
            }
            StreamEvent::ToolUseStart { id, name } => {
                if self.tool_calls.start(&id, &name) && self.forward_tool_calls {
                    return tool_call_chunk(ToolCall::new(id, name, "")).map(Some);
                }
            }
            StreamEvent::TextDelta(text) => {
                self.choice.content.push_str(&text);
                return Ok(Some(text));
            }
            StreamEvent::ToolInputDelta(fragment) => {
                self.tool_calls.append_args(&fragment);
                if self.forward_tool_calls && !fragment.is_empty() {
                    return tool_call_chunk(ToolCall {
                        function: FunctionCall {
                            arguments: fragment,
                            ..Default::default()
                        },
                        ..Default::default()
                    })
                    .map(Some);
                }
            }
            StreamEvent::MessageDelta {
                stop_reason,
                output_tokens,
            } => {
                if let Some(stop_reason) = stop_reason {
                    self.choice.stop_reason = stop_reason;
                }
                if let Some(tokens) = output_tokens {
                    self.set_tokens("output_tokens", tokens);
                }
            }
            StreamEvent::Usage {
                input_tokens,
                output_tokens,
            } => {
                self.fill_tokens("input_tokens", input_tokens);
                self.fill_tokens("output_tokens", output_tokens);
            }
            StreamEvent::Metadata {
                input_tokens,
                output_tokens,
                total_tokens,
                latency_ms,
            } => {
                self.set_tokens("input_tokens", input_tokens);
                self.set_tokens("output_tokens", output_tokens);
                self.set_tokens("total_tokens", total_tokens);
                self.set_tokens("latency_ms", latency_ms);
            }
            StreamEvent::Ignored(kind) => log::debug!("ignoring stream event {:?}", kind),
        }
        Ok(None)
    }

    fn set_tokens(&mut self, key: &str, tokens: u64) {
        self.choice
            .generation_info
            .insert(key.to_string(), Value::from(tokens));
    }

    fn fill_tokens(&mut self, key: &str, tokens: u64) {
        self.choice
            .generation_info
            .entry(key.to_string())
            .or_insert_with(|| Value::from(tokens));
    }

    fn into_response(mut self) -> ContentResponse {
        self.choice.tool_calls = self.tool_calls.into_tool_calls();
        ContentResponse::new(vec![self.choice])
    }
}

/// One tool call as the JSON array chunk sent to the streaming callback.
fn tool_call_chunk(call: ToolCall) -> Result<String, BedrockError> {
    Ok(serde_json::to_string(&[call])?)
}

/// Consume an event stream into one response.
///
/// Events are applied strictly in order. Each text delta is handed to
/// `streaming_func` before the next event is read. A transport error, an
/// undecodable frame or a callback error stops consumption and is returned
/// as [`BedrockError::StreamInterrupted`] carrying what was accumulated so
/// far.
pub async fn consume_stream(
    events: EventStream,
    streaming_func: Option<&StreamingFunc>,
) -> Result<ContentResponse, BedrockError> {
    let events = events.map(|frame| frame.and_then(|bytes| decode_event(&bytes)));
    consume_events(events, streaming_func, false).await
}

/// Consume a Converse event stream into one response.
///
/// Same contract as [`consume_stream`], except that tool-call starts and
/// argument fragments also reach `streaming_func`, each as a JSON array
/// holding one tool call. Fragments carry only `function.arguments`.
pub async fn consume_converse_stream(
    events: ConverseEventStream,
    streaming_func: Option<&StreamingFunc>,
) -> Result<ContentResponse, BedrockError> {
    consume_events(events, streaming_func, true).await
}

async fn consume_events<S>(
    mut events: S,
    streaming_func: Option<&StreamingFunc>,
    forward_tool_calls: bool,
) -> Result<ContentResponse, BedrockError>
where
    S: Stream<Item = Result<StreamEvent, BedrockError>> + Unpin,
{
    let mut state = StreamState {
        forward_tool_calls,
        ..Default::default()
    };

    while let Some(event) = events.next().await {
        let chunk = match event.and_then(|event| state.apply(event)) {
            Ok(Some(chunk)) => chunk,
            Ok(None) => continue,
            Err(err) => return Err(BedrockError::interrupted(state.into_response(), err)),
        };

        if let Some(func) = streaming_func {
            let mut func = func.lock().await;
            if let Err(message) = func(chunk).await {
                return Err(BedrockError::interrupted(
                    state.into_response(),
                    BedrockError::StreamingFuncError(message),
                ));
            }
        }
    }

    Ok(state.into_response())
}
