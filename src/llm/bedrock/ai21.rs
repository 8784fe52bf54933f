//! AI21 Jurassic text completion.
//!
//! Ref: <https://docs.ai21.com/reference/j2-complete-ref>

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

pub const DEFAULT_MAX_TOKENS: u32 = 2048;

#[derive(Debug, Default, Serialize, PartialEq)]
struct PenaltyScale {
    scale: f32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Ai21Request {
    prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop_sequences: Option<Vec<String>>,
    count_penalty: PenaltyScale,
    presence_penalty: PenaltyScale,
    frequency_penalty: PenaltyScale,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_results: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct Ai21Response {
    /// Documented as a string, observed as a number.
    #[serde(default)]
    id: Value,
    #[serde(default)]
    prompt: Ai21Tokens,
    #[serde(default)]
    completions: Vec<Ai21Completion>,
}

#[derive(Debug, Default, Deserialize)]
struct Ai21Tokens {
    #[serde(default)]
    tokens: Vec<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Ai21Completion {
    data: Ai21CompletionData,
    #[serde(default)]
    finish_reason: Ai21FinishReason,
}

#[derive(Debug, Deserialize)]
struct Ai21CompletionData {
    #[serde(default)]
    text: String,
    #[serde(default)]
    tokens: Vec<Value>,
}

#[derive(Debug, Default, Deserialize)]
struct Ai21FinishReason {
    /// One of `length`, `stop`, `endoftext`.
    #[serde(default)]
    reason: String,
}

pub(crate) fn encode_request(
    messages: &[BedrockMessage],
    options: &CallOptions,
) -> Result<Vec<u8>, BedrockError> {
    let request = Ai21Request {
        prompt: process_input_messages_generic(messages),
        temperature: options.temperature,
        top_p: options.top_p,
        max_tokens: options.max_tokens_or(DEFAULT_MAX_TOKENS),
        stop_sequences: options.stop_words.clone(),
        count_penalty: PenaltyScale {
            scale: options.repetition_penalty.unwrap_or_default(),
        },
        presence_penalty: PenaltyScale::default(),
        frequency_penalty: PenaltyScale::default(),
        num_results: options.candidate_count,
    };
    Ok(serde_json::to_vec(&request)?)
}

pub(crate) fn decode_response(body: &[u8]) -> Result<ContentResponse, BedrockError> {
    let output: Ai21Response = serde_json::from_slice(body)?;
    if output.completions.is_empty() {
        return Err(BedrockError::EmptyResult("no completions"));
    }

    let input_tokens = output.prompt.tokens.len();
    let choices = output
        .completions
        .into_iter()
        .map(|completion| ContentChoice {
            generation_info: HashMap::from([
                ("id".to_string(), output.id.clone()),
                ("input_tokens".to_string(), Value::from(input_tokens)),
                (
                    "output_tokens".to_string(),
                    Value::from(completion.data.tokens.len()),
                ),
            ]),
            content: completion.data.text,
            stop_reason: completion.finish_reason.reason,
            tool_calls: Vec::new(),
        })
        .collect();

    Ok(ContentResponse::new(choices))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::schemas::MessageType;

    #[test]
    fn test_encode_request() {
        let messages = [BedrockMessage::text(
            Some(MessageType::HumanMessage),
            "What is the capital of France?",
        )];
        let options = CallOptions::new()
            .with_temperature(0.5)
            .with_max_tokens(100)
            .with_stop_words(vec!["END".to_string()])
            .with_repetition_penalty(1.5)
            .with_candidate_count(2);

        let body: Value = serde_json::from_slice(&encode_request(&messages, &options).unwrap()).unwrap();
        assert_eq!(
            body,
            json!({
                "prompt": "\nhuman: What is the capital of France?\nAI: ",
                "temperature": 0.5,
                "maxTokens": 100,
                "stopSequences": ["END"],
                "countPenalty": {"scale": 1.5},
                "presencePenalty": {"scale": 0.0},
                "frequencyPenalty": {"scale": 0.0},
                "numResults": 2
            })
        );
    }

    #[test]
    fn test_encode_request_default_max_tokens() {
        let body: Value =
            serde_json::from_slice(&encode_request(&[], &CallOptions::new()).unwrap()).unwrap();
        assert_eq!(body["maxTokens"], 2048);
        assert_eq!(body["prompt"], "");
        assert!(body.get("numResults").is_none());
    }

    #[test]
    fn test_decode_response() {
        let body = json!({
            "id": 1234,
            "prompt": {"tokens": [{}, {}, {}]},
            "completions": [
                {"data": {"text": "Paris", "tokens": [{}]}, "finishReason": {"reason": "endoftext"}},
                {"data": {"text": "Paris.", "tokens": [{}, {}]}, "finishReason": {"reason": "length"}}
            ]
        });
        let response = decode_response(body.to_string().as_bytes()).unwrap();

        assert_eq!(response.choices.len(), 2);
        assert_eq!(response.choices[0].content, "Paris");
        assert_eq!(response.choices[0].stop_reason, "endoftext");
        assert_eq!(response.choices[0].generation_info["id"], json!(1234));
        assert_eq!(response.choices[0].generation_info["input_tokens"], json!(3));
        assert_eq!(response.choices[1].generation_info["output_tokens"], json!(2));
    }

    #[test]
    fn test_decode_empty_completions() {
        let err = decode_response(br#"{"id": "x", "completions": []}"#).unwrap_err();
        assert!(matches!(err, BedrockError::EmptyResult("no completions")));
    }

    #[test]
    fn test_decode_malformed_json() {
        let err = decode_response(b"not json").unwrap_err();
        assert!(matches!(err, BedrockError::Serialization(_)));
    }
}
