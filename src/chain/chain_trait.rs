use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;

use crate::prompt::PromptArgs;

use super::ChainError;

pub const DEFAULT_OUTPUT_KEY: &str = "text";

#[async_trait]
pub trait Chain: Sync + Send {
    /// Run the chain on named inputs and return its named outputs.
    async fn call(&self, input_variables: PromptArgs) -> Result<HashMap<String, Value>, ChainError>;

    /// Key under which the primary text output is returned.
    fn output_key(&self) -> &str {
        DEFAULT_OUTPUT_KEY
    }

    /// Run the chain and return the primary output as a string.
    async fn invoke(&self, input_variables: PromptArgs) -> Result<String, ChainError> {
        let key = self.output_key().to_string();
        let mut outputs = self.call(input_variables).await?;
        match outputs.remove(&key) {
            Some(Value::String(text)) => Ok(text),
            Some(_) => Err(ChainError::OtherError(format!(
                "output key {} is not a string",
                key
            ))),
            None => Err(ChainError::OtherError(format!(
                "output key {} not found",
                key
            ))),
        }
    }
}

impl<C> From<C> for Box<dyn Chain>
where
    C: Chain + 'static,
{
    fn from(chain: C) -> Self {
        Box::new(chain)
    }
}
