use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;

use crate::{
    language_models::llm::LLM,
    prompt::{PromptArgs, PromptTemplate},
    schemas::Message,
};

use super::{Chain, ChainError, DEFAULT_OUTPUT_KEY};

/// Formats a prompt template and sends it to an LLM as a single human turn.
pub struct LLMChain {
    prompt: PromptTemplate,
    llm: Box<dyn LLM>,
    output_key: String,
}

impl LLMChain {
    pub fn new<L: Into<Box<dyn LLM>>>(llm: L, prompt: PromptTemplate) -> Self {
        Self {
            prompt,
            llm: llm.into(),
            output_key: DEFAULT_OUTPUT_KEY.to_string(),
        }
    }

    pub fn with_output_key<S: Into<String>>(mut self, output_key: S) -> Self {
        self.output_key = output_key.into();
        self
    }
}

#[async_trait]
impl Chain for LLMChain {
    async fn call(&self, input_variables: PromptArgs) -> Result<HashMap<String, Value>, ChainError> {
        let prompt = self.prompt.format(&input_variables)?;
        log::debug!("LLMChain prompt: {}", prompt);

        let result = self
            .llm
            .generate(&[Message::new_human_message(prompt)])
            .await?;

        let mut outputs = HashMap::new();
        outputs.insert(self.output_key.clone(), Value::String(result.generation));
        if let Some(tokens) = result.tokens {
            outputs.insert(
                "total_tokens".to_string(),
                Value::from(tokens.total_tokens),
            );
        }
        Ok(outputs)
    }

    fn output_key(&self) -> &str {
        &self.output_key
    }
}
