//! Cohere Command text generation.
//!
//! Ref: <https://docs.aws.amazon.com/bedrock/latest/userguide/model-parameters-cohere-command.html>

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

pub const DEFAULT_MAX_TOKENS: u32 = 20;

#[derive(Debug, Serialize)]
struct CohereRequest {
    prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    k: Option<usize>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop_sequences: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_generations: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct CohereResponse {
    #[serde(default)]
    generations: Vec<CohereGeneration>,
}

#[derive(Debug, Deserialize)]
struct CohereGeneration {
    #[serde(default)]
    id: String,
    /// One of `COMPLETE`, `MAX_TOKENS`, `ERROR`, `ERROR_TOXIC`.
    #[serde(default)]
    finish_reason: String,
    #[serde(default)]
    text: String,
}

pub(crate) fn encode_request(
    messages: &[BedrockMessage],
    options: &CallOptions,
) -> Result<Vec<u8>, BedrockError> {
    let request = CohereRequest {
        prompt: process_input_messages_generic(messages),
        temperature: options.temperature,
        p: options.top_p,
        k: options.top_k,
        max_tokens: options.max_tokens_or(DEFAULT_MAX_TOKENS),
        stop_sequences: options.stop_words.clone(),
        num_generations: options.candidate_count,
    };
    Ok(serde_json::to_vec(&request)?)
}

pub(crate) fn decode_response(body: &[u8]) -> Result<ContentResponse, BedrockError> {
    let output: CohereResponse = serde_json::from_slice(body)?;
    if output.generations.is_empty() {
        return Err(BedrockError::EmptyResult("no generations"));
    }

    let choices = output
        .generations
        .into_iter()
        .enumerate()
        .map(|(index, generation)| ContentChoice {
            content: generation.text,
            stop_reason: generation.finish_reason,
            tool_calls: Vec::new(),
            generation_info: HashMap::from([
                ("generation_id".to_string(), Value::from(generation.id)),
                ("index".to_string(), Value::from(index)),
            ]),
        })
        .collect();

    Ok(ContentResponse::new(choices))
}
