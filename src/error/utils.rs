use std::fmt;

use super::{BedrockError, LLMError, LangChainError, RetrieverError};

/// Stable numeric codes for error classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// LLM errors (1000-1999)
    LLMError = 1000,
    LLMInvalidResponse = 1003,
    LLMUnsupportedProvider = 1010,
    LLMEmptyResult = 1011,
    LLMIncompleteGeneration = 1012,
    LLMInvalidRequest = 1013,
    LLMTransportError = 1014,
    LLMStreamInterrupted = 1015,

    /// Chain errors (2000-2999)
    ChainError = 2000,

    /// Retriever errors (7000-7999)
    RetrieverQueryError = 7002,
    RetrieverQueryGenerationError = 7003,

    /// General errors (9000-9999)
    ConfigurationError = 9000,
    JsonError = 9002,
}

impl ErrorCode {
    pub fn from_error(error: &LangChainError) -> Self {
        match error {
            LangChainError::LLMError(LLMError::BedrockError(err)) => Self::from_bedrock(err),
            LangChainError::LLMError(LLMError::SerdeError(_)) => ErrorCode::LLMInvalidResponse,
            LangChainError::LLMError(_) => ErrorCode::LLMError,
            LangChainError::ChainError(_) => ErrorCode::ChainError,
            LangChainError::RetrieverError(RetrieverError::QueryError(_)) => {
                ErrorCode::RetrieverQueryError
            }
            LangChainError::RetrieverError(RetrieverError::ChainError(_)) => {
                ErrorCode::RetrieverQueryGenerationError
            }
            LangChainError::ConfigurationError(_) => ErrorCode::ConfigurationError,
            LangChainError::JsonError(_) => ErrorCode::JsonError,
        }
    }

    fn from_bedrock(error: &BedrockError) -> Self {
        match error {
            BedrockError::UnsupportedProvider(_) => ErrorCode::LLMUnsupportedProvider,
            BedrockError::EmptyResult(_) => ErrorCode::LLMEmptyResult,
            BedrockError::IncompleteGeneration(_) => ErrorCode::LLMIncompleteGeneration,
            BedrockError::InvalidParameterError(_)
            | BedrockError::MultipleSystemPrompts
            | BedrockError::SystemPromptNotText
            | BedrockError::RoleNotSupported(_)
            | BedrockError::UnsupportedToolChoice(_) => ErrorCode::LLMInvalidRequest,
            BedrockError::Serialization(_) | BedrockError::UnsupportedContent(_) => {
                ErrorCode::LLMInvalidResponse
            }
            BedrockError::Transport(_) => ErrorCode::LLMTransportError,
            BedrockError::StreamingFuncError(_) | BedrockError::StreamInterrupted { .. } => {
                ErrorCode::LLMStreamInterrupted
            }
        }
    }

    pub fn as_u32(self) -> u32 {
        self as u32
    }

    pub fn description(self) -> &'static str {
        match self {
            ErrorCode::LLMError => "LLM operation failed",
            ErrorCode::LLMInvalidResponse => "LLM returned invalid response",
            ErrorCode::LLMUnsupportedProvider => "Model provider is not supported",
            ErrorCode::LLMEmptyResult => "LLM returned no results",
            ErrorCode::LLMIncompleteGeneration => "LLM stopped before completing",
            ErrorCode::LLMInvalidRequest => "LLM request is invalid",
            ErrorCode::LLMTransportError => "LLM transport failed",
            ErrorCode::LLMStreamInterrupted => "LLM stream interrupted",
            ErrorCode::ChainError => "Chain operation failed",
            ErrorCode::RetrieverQueryError => "Retriever query failed",
            ErrorCode::RetrieverQueryGenerationError => "Retriever query generation failed",
            ErrorCode::ConfigurationError => "Configuration error",
            ErrorCode::JsonError => "JSON parsing/serialization failed",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "E{:04}: {}", self.as_u32(), self.description())
    }
}

/// Error message prefixed with its code.
///
/// ```rust
/// use langchain_ai_bedrock::error::{error_info, LangChainError};
///
/// let error = LangChainError::ConfigurationError("invalid config".to_string());
/// assert_eq!(
///     error_info(&error),
///     "[E9000: Configuration error] Configuration error: invalid config"
/// );
/// ```
pub fn error_info(error: &LangChainError) -> String {
    format!("[{}] {}", ErrorCode::from_error(error), error)
}
