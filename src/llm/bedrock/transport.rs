use std::sync::Arc;

use async_trait::async_trait;

use super::{
    converse::{ConverseEventStream, ConverseOutput, ConverseRequest},
    stream::EventStream,
    BedrockError,
};

/// Sends encoded request bodies to Bedrock.
///
/// Retries, credentials and endpoints belong to the implementation.
#[async_trait]
pub trait BedrockTransport: Send + Sync {
    /// One request, one response body.
    async fn invoke(&self, model_id: &str, body: Vec<u8>) -> Result<Vec<u8>, BedrockError>;

    /// One request, a stream of raw event frames.
    async fn invoke_streaming(
        &self,
        model_id: &str,
        body: Vec<u8>,
    ) -> Result<EventStream, BedrockError>;

    /// One Converse request, one reply.
    async fn converse(
        &self,
        model_id: &str,
        _request: ConverseRequest,
    ) -> Result<ConverseOutput, BedrockError> {
        Err(BedrockError::Transport(format!(
            "converse is not supported by this transport ({})",
            model_id
        )))
    }

    /// One Converse request, a stream of decoded events.
    async fn converse_stream(
        &self,
        model_id: &str,
        _request: ConverseRequest,
    ) -> Result<ConverseEventStream, BedrockError> {
        Err(BedrockError::Transport(format!(
            "converse stream is not supported by this transport ({})",
            model_id
        )))
    }
}

#[async_trait]
impl<T> BedrockTransport for Arc<T>
where
    T: BedrockTransport + ?Sized,
{
    async fn invoke(&self, model_id: &str, body: Vec<u8>) -> Result<Vec<u8>, BedrockError> {
        (**self).invoke(model_id, body).await
    }

    async fn invoke_streaming(
        &self,
        model_id: &str,
        body: Vec<u8>,
    ) -> Result<EventStream, BedrockError> {
        (**self).invoke_streaming(model_id, body).await
    }

    async fn converse(
        &self,
        model_id: &str,
        request: ConverseRequest,
    ) -> Result<ConverseOutput, BedrockError> {
        (**self).converse(model_id, request).await
    }

    async fn converse_stream(
        &self,
        model_id: &str,
        request: ConverseRequest,
    ) -> Result<ConverseEventStream, BedrockError> {
        (**self).converse_stream(model_id, request).await
    }
}
