use std::fmt;

use crate::{
    language_models::options::CallOptions,
    schemas::ContentResponse,
};

use super::{ai21, amazon, anthropic, cohere, meta, models::BedrockMessage, nova, BedrockError};

/// The model family behind a Bedrock model id.
///
/// Resolved once per request from the model id, then dispatched with `match`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provider {
    Ai21,
    Amazon,
    Anthropic,
    Cohere,
    Meta,
    Nova,
}

impl Provider {
    /// Resolve the provider for `model_id`.
    ///
    /// Nova is matched by substring (`amazon.nova`) before anything else,
    /// because its ids share the `amazon.` prefix with Titan. Every other
    /// provider is the first `.`-separated segment, case-sensitive. When
    /// that segment names no provider it is taken as a cross-region prefix
    /// (`us.`, `jp.`, `apac.`, ...) and the second segment decides.
    pub fn from_model_id(model_id: &str) -> Result<Self, BedrockError> {
        if model_id.contains("amazon.nova") {
            return Ok(Provider::Nova);
        }

        let mut segments = model_id.split('.');
        segments
            .next()
            .and_then(Self::from_tag)
            .or_else(|| segments.next().and_then(Self::from_tag))
            .ok_or_else(|| BedrockError::UnsupportedProvider(model_id.to_string()))
    }

    fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "ai21" => Some(Provider::Ai21),
            "amazon" => Some(Provider::Amazon),
            "anthropic" => Some(Provider::Anthropic),
            "cohere" => Some(Provider::Cohere),
            "meta" => Some(Provider::Meta),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Ai21 => "ai21",
            Provider::Amazon => "amazon",
            Provider::Anthropic => "anthropic",
            Provider::Cohere => "cohere",
            Provider::Meta => "meta",
            Provider::Nova => "nova",
        }
    }

    /// Whether the provider can answer through the response stream.
    pub fn supports_streaming(&self) -> bool {
        matches!(self, Provider::Anthropic | Provider::Nova)
    }

    /// Serialize the provider-specific request body.
    pub fn encode_request(
        &self,
        messages: &[BedrockMessage],
        options: &CallOptions,
    ) -> Result<Vec<u8>, BedrockError> {
        match self {
            Provider::Ai21 => ai21::encode_request(messages, options),
            Provider::Amazon => amazon::encode_request(messages, options),
            Provider::Anthropic => anthropic::encode_request(messages, options),
            Provider::Cohere => cohere::encode_request(messages, options),
            Provider::Meta => meta::encode_request(messages, options),
            Provider::Nova => nova::encode_request(messages, options),
        }
    }

    /// Parse a provider response body into the canonical shape.
    pub fn decode_response(&self, body: &[u8]) -> Result<ContentResponse, BedrockError> {
        match self {
            Provider::Ai21 => ai21::decode_response(body),
            Provider::Amazon => amazon::decode_response(body),
            Provider::Anthropic => anthropic::decode_response(body),
            Provider::Cohere => cohere::decode_response(body),
            Provider::Meta => meta::decode_response(body),
            Provider::Nova => nova::decode_response(body),
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
