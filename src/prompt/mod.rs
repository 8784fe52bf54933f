//! Prompt templates with `{variable}` placeholders.

use std::collections::HashMap;

use serde_json::Value;
use thiserror::Error;

/// Named inputs fed to a prompt template or chain.
pub type PromptArgs = HashMap<String, Value>;

#[derive(Error, Debug, PartialEq)]
pub enum PromptError {
    #[error("Variable {0} is missing from input variables")]
    MissingVariable(String),
}

/// Build a [`PromptArgs`] map from `key => value` pairs.
///
/// ```rust
/// use langchain_ai_bedrock::prompt_args;
/// let args = prompt_args! { "question" => "What is Rust?" };
/// assert_eq!(args["question"], "What is Rust?");
/// ```
#[macro_export]
macro_rules! prompt_args {
    ( $($key:expr => $value:expr),* $(,)? ) => {
        {
            #[allow(unused_mut)]
            let mut args = $crate::prompt::PromptArgs::new();
            $(
                args.insert($key.to_string(), serde_json::json!($value));
            )*
            args
        }
    };
}

#[derive(Debug, Clone, PartialEq)]
pub struct PromptTemplate {
    template: String,
    input_variables: Vec<String>,
}

impl PromptTemplate {
    pub fn new<S: Into<String>>(template: S, input_variables: Vec<String>) -> Self {
        Self {
            template: template.into(),
            input_variables,
        }
    }

    pub fn input_variables(&self) -> &[String] {
        &self.input_variables
    }

    /// Substitute every declared variable. String values are inserted raw,
    /// anything else as its JSON text.
    pub fn format(&self, input_variables: &PromptArgs) -> Result<String, PromptError> {
        let mut prompt = self.template.clone();
        for key in &self.input_variables {
            let value = input_variables
                .get(key)
                .ok_or_else(|| PromptError::MissingVariable(key.clone()))?;
            let rendered = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            prompt = prompt.replace(&format!("{{{}}}", key), &rendered);
        }
        Ok(prompt)
    }
}
