use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    language_models::{llm::LLM, options::CallOptions, LLMError},
    schemas::{ContentResponse, Message},
};

use super::{
    converse::{build_request, decode_output},
    models::{process_messages, BedrockModel},
    stream::{consume_converse_stream, consume_stream},
    transport::BedrockTransport,
    BedrockError, Provider,
};

/// AWS Bedrock client
///
/// Routes every request to the provider adapter selected by the model id and
/// returns one canonical [`ContentResponse`] regardless of provider.
#[derive(Clone)]
pub struct Bedrock {
    model: String,
    options: CallOptions,
    use_converse: bool,
    transport: Arc<dyn BedrockTransport>,
}

impl Bedrock {
    /// Create a new Bedrock client from the AWS environment configuration
    #[cfg(feature = "bedrock")]
    pub async fn new() -> Result<Self, LLMError> {
        let transport = super::AwsTransport::from_env().await;
        Ok(Self::with_transport(transport))
    }

    /// Create a client over any transport
    pub fn with_transport<T: BedrockTransport + 'static>(transport: T) -> Self {
        Self {
            model: BedrockModel::Claude35Sonnet.to_string(),
            options: CallOptions::default(),
            use_converse: false,
            transport: Arc::new(transport),
        }
    }

    /// Set the model
    pub fn with_model<S: Into<String>>(mut self, model: S) -> Self {
        self.model = model.into();
        self
    }

    /// Set call options
    pub fn with_options(mut self, options: CallOptions) -> Self {
        self.options = options;
        self
    }

    /// Answer [`LLM::generate_content`] through the Converse API
    pub fn with_converse(mut self, use_converse: bool) -> Self {
        self.use_converse = use_converse;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Run one completion against `model_id`.
    ///
    /// Anthropic and Nova stream when `options` carries a streaming function;
    /// every other provider ignores it and answers in one response.
    pub async fn create_completion(
        &self,
        model_id: &str,
        messages: &[Message],
        options: &CallOptions,
    ) -> Result<ContentResponse, BedrockError> {
        let provider = Provider::from_model_id(model_id)?;
        log::debug!("bedrock model {} routed to provider {}", model_id, provider);

        let body = provider.encode_request(&process_messages(messages), options)?;

        match &options.streaming_func {
            Some(func) if provider.supports_streaming() => {
                let events = self.transport.invoke_streaming(model_id, body).await?;
                consume_stream(events, Some(func)).await
            }
            _ => {
                let response = self.transport.invoke(model_id, body).await?;
                provider.decode_response(&response)
            }
        }
    }

    /// Run one completion against `model_id` through the Converse API.
    ///
    /// Works for any model Converse serves, so no provider routing happens.
    /// With a streaming function, text deltas and tool-call chunks reach it
    /// as they arrive.
    pub async fn converse(
        &self,
        model_id: &str,
        messages: &[Message],
        options: &CallOptions,
    ) -> Result<ContentResponse, BedrockError> {
        let request = build_request(&process_messages(messages), options)?;
        log::debug!(
            "bedrock converse with {} on {} messages",
            model_id,
            request.messages.len()
        );

        match &options.streaming_func {
            Some(func) => {
                let events = self.transport.converse_stream(model_id, request).await?;
                consume_converse_stream(events, Some(func)).await
            }
            None => decode_output(self.transport.converse(model_id, request).await?),
        }
    }
}

#[async_trait]
impl LLM for Bedrock {
    async fn generate_content(&self, messages: &[Message]) -> Result<ContentResponse, LLMError> {
        let response = if self.use_converse {
            self.converse(&self.model, messages, &self.options).await
        } else {
            self.create_completion(&self.model, messages, &self.options)
                .await
        };
        Ok(response?)
    }

    fn add_options(&mut self, options: CallOptions) {
        self.options.merge_options(options)
    }
}
