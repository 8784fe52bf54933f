use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::language_models::TokenUsage;

/// Provider-agnostic result of a completion call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContentResponse {
    pub choices: Vec<ContentChoice>,
}

impl ContentResponse {
    pub fn new(choices: Vec<ContentChoice>) -> Self {
        Self { choices }
    }

    /// The first choice, which is the only one for single-candidate providers.
    pub fn first(&self) -> Option<&ContentChoice> {
        self.choices.first()
    }
}

/// One candidate generation.
///
/// `stop_reason` is the provider's own vocabulary, passed through untouched.
/// `generation_info` is a loose bag for token counts and provider metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContentChoice {
    pub content: String,
    pub stop_reason: String,
    pub tool_calls: Vec<ToolCall>,
    pub generation_info: HashMap<String, Value>,
}

impl ContentChoice {
    /// Token usage read back from the `input_tokens`/`output_tokens` entries.
    pub fn token_usage(&self) -> Option<TokenUsage> {
        let read = |key: &str| {
            self.generation_info
                .get(key)
                .and_then(Value::as_u64)
                .and_then(|v| u32::try_from(v).ok())
        };
        match (read("input_tokens"), read("output_tokens")) {
            (None, None) => None,
            (input, output) => Some(TokenUsage::new(
                input.unwrap_or_default(),
                output.unwrap_or_default(),
            )),
        }
    }
}

/// A model-requested function invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    #[serde(rename = "type")]
    pub call_type: String,
    pub function: FunctionCall,
}

impl ToolCall {
    pub fn new<I, N, A>(id: I, name: N, arguments: A) -> Self
    where
        I: Into<String>,
        N: Into<String>,
        A: Into<String>,
    {
        Self {
            id: id.into(),
            call_type: "function".to_string(),
            function: FunctionCall {
                name: name.into(),
                arguments: arguments.into(),
            },
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    /// Raw JSON text of the arguments object.
    pub arguments: String,
}
