//! Amazon Titan text generation.
//!
//! Ref: <https://docs.aws.amazon.com/bedrock/latest/userguide/model-parameters-titan-text.html>

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
#[serde(rename_all = "camelCase")]
struct TitanRequest {
    input_text: String,
    text_generation_config: TitanGenerationConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TitanGenerationConfig {
    max_token_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop_sequences: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TitanResponse {
    #[serde(default)]
    input_text_token_count: u64,
    #[serde(default)]
    results: Vec<TitanResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TitanResult {
    #[serde(default)]
    token_count: u64,
    #[serde(default)]
    output_text: String,
    /// One of `FINISH`, `LENGTH`, `CONTENT_FILTERED`.
    #[serde(default)]
    completion_reason: String,
}

pub(crate) fn encode_request(
    messages: &[BedrockMessage],
    options: &CallOptions,
) -> Result<Vec<u8>, BedrockError> {
    let request = TitanRequest {
        input_text: process_input_messages_generic(messages),
        text_generation_config: TitanGenerationConfig {
            max_token_count: options.max_tokens_or(DEFAULT_MAX_TOKENS),
            top_p: options.top_p,
            temperature: options.temperature,
            stop_sequences: options.stop_words.clone(),
        },
    };
    Ok(serde_json::to_vec(&request)?)
}

pub(crate) fn decode_response(body: &[u8]) -> Result<ContentResponse, BedrockError> {
    let output: TitanResponse = serde_json::from_slice(body)?;
    if output.results.is_empty() {
        return Err(BedrockError::EmptyResult("no results"));
    }

    let choices = output
        .results
        .into_iter()
        .map(|result| ContentChoice {
            content: result.output_text,
            stop_reason: result.completion_reason,
            tool_calls: Vec::new(),
            generation_info: HashMap::from([
                (
                    "input_tokens".to_string(),
                    Value::from(output.input_text_token_count),
                ),
                ("output_tokens".to_string(), Value::from(result.token_count)),
            ]),
        })
        .collect();

    Ok(ContentResponse::new(choices))
}
