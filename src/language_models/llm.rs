use async_trait::async_trait;

use crate::schemas::{ContentResponse, Message};

use super::{options::CallOptions, GenerateResult, LLMError};

#[async_trait]
pub trait LLM: Sync + Send {
    /// Run the model and return every candidate in canonical form.
    async fn generate_content(&self, messages: &[Message]) -> Result<ContentResponse, LLMError>;

    async fn generate(&self, messages: &[Message]) -> Result<GenerateResult, LLMError> {
        let response = self.generate_content(messages).await?;
        let choice = response
            .first()
            .ok_or_else(|| LLMError::ContentNotFound("choices[0]".to_string()))?;
        Ok(GenerateResult {
            tokens: choice.token_usage(),
            generation: choice.content.clone(),
        })
    }

    async fn invoke(&self, prompt: &str) -> Result<String, LLMError> {
        self.generate(&[Message::new_human_message(prompt)])
            .await
            .map(|res| res.generation)
    }

    /// This is usefull when you want to create a chain and override
    /// LLM options
    fn add_options(&mut self, _options: CallOptions) {
        // No action taken
    }
}

impl<L> From<L> for Box<dyn LLM>
where
    L: 'static + LLM,
{
    fn from(llm: L) -> Self {
        Box::new(llm)
    }
}
