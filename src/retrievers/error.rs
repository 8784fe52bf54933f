use thiserror::Error;

use crate::chain::ChainError;

/// Errors specific to retrievers
#[derive(Error, Debug)]
pub enum RetrieverError {
    #[error("Query failed: {0}")]
    QueryError(String),

    #[error("Query generation error: {0}")]
    ChainError(#[from] ChainError),
}
