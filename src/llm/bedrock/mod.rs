//! AWS Bedrock: provider routing, request encoding and response decoding
//! for AI21, Amazon Titan, Anthropic, Cohere, Meta and Nova models.

mod ai21;
mod amazon;
mod anthropic;
#[cfg(feature = "bedrock")]
mod aws;
mod cohere;
mod meta;
mod nova;

pub mod client;
pub mod converse;
pub mod error;
pub mod models;
pub mod provider;
pub mod stream;
pub mod transport;

#[cfg(feature = "bedrock")]
pub use aws::AwsTransport;
pub use client::Bedrock;
pub use converse::{
    ConverseBlock, ConverseEventStream, ConverseMessage, ConverseOutput, ConverseRequest,
    ConverseRole, ConverseToolChoice, ConverseUsage, ImageFormat, InferenceConfig, ToolConfig,
};
pub use error::BedrockError;
pub use models::{process_messages, BedrockMessage, BedrockModel};
pub use provider::Provider;
pub use stream::{
    consume_converse_stream, consume_stream, decode_event, EventStream, StreamEvent,
    ToolCallAccumulator,
};
pub use transport::BedrockTransport;
