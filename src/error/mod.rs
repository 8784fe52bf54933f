//! Top-level error type combining every module error.
//!
//! Module errors convert into [`LangChainError`] with `?`, and
//! [`error_info`] renders any of them with a stable error code.

pub use crate::chain::ChainError;
pub use crate::language_models::LLMError;
pub use crate::llm::BedrockError;
pub use crate::retrievers::RetrieverError;

mod utils;
pub use utils::*;

#[derive(thiserror::Error, Debug)]
pub enum LangChainError {
    #[error("LLM error: {0}")]
    LLMError(#[from] LLMError),

    #[error("Chain error: {0}")]
    ChainError(#[from] ChainError),

    #[error("Retriever error: {0}")]
    RetrieverError(#[from] RetrieverError),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl From<BedrockError> for LangChainError {
    fn from(err: BedrockError) -> Self {
        LangChainError::LLMError(LLMError::BedrockError(err))
    }
}

pub type Result<T> = std::result::Result<T, LangChainError>;
