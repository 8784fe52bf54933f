use thiserror::Error;

use crate::{language_models::LLMError, prompt::PromptError};

#[derive(Error, Debug)]
pub enum ChainError {
    #[error("LLM error: {0}")]
    LLMError(#[from] LLMError),

    #[error("Prompt error: {0}")]
    PromptError(#[from] PromptError),

    #[error("Error: {0}")]
    OtherError(String),
}
