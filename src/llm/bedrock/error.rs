use thiserror::Error;

use crate::schemas::ContentResponse;

#[derive(Error, Debug)]
pub enum BedrockError {
    #[error("Bedrock API error: Unsupported provider - {0}")]
    UnsupportedProvider(String),

    /// The provider answered with a well-formed but empty list of results.
    #[error("Bedrock API error: {0}")]
    EmptyResult(&'static str),

    /// Generation stopped for a reason the caller has to act on.
    #[error("completed due to {0}. Maybe try increasing max tokens")]
    IncompleteGeneration(String),

    #[error("Bedrock API error: Invalid parameter - {0}")]
    InvalidParameterError(String),

    #[error("Bedrock API error: multiple system prompts")]
    MultipleSystemPrompts,

    #[error("Bedrock API error: system prompt must be text")]
    SystemPromptNotText,

    #[error("Bedrock API error: role not supported - {0}")]
    RoleNotSupported(String),

    #[error("Bedrock API error: Unsupported tool choice - {0}")]
    UnsupportedToolChoice(String),

    /// The reply carried a content block the canonical response cannot hold.
    #[error("Bedrock API error: unsupported content part - {0}")]
    UnsupportedContent(String),

    #[error("Bedrock API error: Serialization error - {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Bedrock API error: Transport error - {0}")]
    Transport(String),

    #[error("Bedrock API error: Streaming function error - {0}")]
    StreamingFuncError(String),

    /// A stream stopped early. `partial` holds everything accumulated
    /// before the failure.
    #[error("Bedrock API error: stream interrupted - {source}")]
    StreamInterrupted {
        partial: Box<ContentResponse>,
        #[source]
        source: Box<BedrockError>,
    },
}

impl BedrockError {
    pub(crate) fn interrupted(partial: ContentResponse, source: BedrockError) -> Self {
        BedrockError::StreamInterrupted {
            partial: Box::new(partial),
            source: Box::new(source),
        }
    }

    /// The partially accumulated response of an interrupted stream.
    pub fn partial_response(&self) -> Option<&ContentResponse> {
        match self {
            BedrockError::StreamInterrupted { partial, .. } => Some(partial),
            _ => None,
        }
    }
}
