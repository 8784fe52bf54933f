//! Meta Llama text generation.
//!
//! Ref: <https://docs.aws.amazon.com/bedrock/latest/userguide/model-parameters-meta.html>

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    language_models::options::CallOptions,
    schemas::{ContentChoice, ContentResponse},
};

use super::{
    models::{process_input_messages_generic, BedrockMessage},
    BedrockError,
};

pub const DEFAULT_MAX_TOKENS: u32 = 512;

#[derive(Debug, Serialize)]
struct LlamaRequest {
    prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    max_gen_len: u32,
}

#[derive(Debug, Deserialize)]
struct LlamaResponse {
    #[serde(default)]
    generation: String,
    #[serde(default)]
    prompt_token_count: u64,
    #[serde(default)]
    generation_token_count: u64,
    /// One of `stop`, `length`.
    #[serde(default)]
    stop_reason: String,
}

pub(crate) fn encode_request(
    messages: &[BedrockMessage],
    options: &CallOptions,
) -> Result<Vec<u8>, BedrockError> {
    let request = LlamaRequest {
        prompt: process_input_messages_generic(messages),
        temperature: options.temperature,
        top_p: options.top_p,
        max_gen_len: options.max_tokens_or(DEFAULT_MAX_TOKENS),
    };
    Ok(serde_json::to_vec(&request)?)
}

pub(crate) fn decode_response(body: &[u8]) -> Result<ContentResponse, BedrockError> {
    let output: LlamaResponse = serde_json::from_slice(body)?;

    Ok(ContentResponse::new(vec![ContentChoice {
        content: output.generation,
        stop_reason: output.stop_reason,
        tool_calls: Vec::new(),
        generation_info: HashMap::from([
            (
                "input_tokens".to_string(),
                Value::from(output.prompt_token_count),
            ),
            (
                "output_tokens".to_string(),
                Value::from(output.generation_token_count),
            ),
        ]),
    }]))
}
