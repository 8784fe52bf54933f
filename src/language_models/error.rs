use serde_json::Error as SerdeJsonError;
use thiserror::Error;

use crate::llm::BedrockError;

#[derive(Error, Debug)]
pub enum LLMError {
    #[error("Bedrock error: {0}")]
    BedrockError(#[from] BedrockError),

    #[error("JSON serialization/deserialization error: {0}")]
    SerdeError(#[from] SerdeJsonError),

    #[error("Content not found in response: Expected at {0}")]
    ContentNotFound(String),
}
