pub mod chain_trait;
pub use chain_trait::*;

pub mod llm_chain;
pub use llm_chain::*;

mod error;
pub use error::*;
