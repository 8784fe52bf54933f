//! # langchain-ai-bedrock
//!
//! AWS Bedrock models behind one canonical response shape, plus a multi-query
//! retriever that fans a question out into several rewrites.
//!
//! ## Overview
//!
//! - **Bedrock**: routes a model id (`anthropic.claude-...`, `us.meta.llama3-...`,
//!   `amazon.nova-lite-v1:0`) to its provider adapter and returns a
//!   [`schemas::ContentResponse`] for AI21, Titan, Claude, Cohere, Llama and Nova
//! - **Streaming**: folds Anthropic and Nova response-stream events into the same
//!   response, forwarding text deltas to a callback and assembling tool calls
//! - **Multi-query retrieval**: generates query variants with an LLM chain, runs
//!   them against a base retriever and deduplicates the documents
//!
//! ## Installation
//!
//! ```toml
//! [dependencies]
//! langchain-ai-bedrock = { version = "0.1", features = ["bedrock"] }
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use langchain_ai_bedrock::language_models::{llm::LLM, options::CallOptions};
//! use langchain_ai_bedrock::llm::{Bedrock, BedrockModel};
//! use langchain_ai_bedrock::schemas::Message;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let bedrock = Bedrock::new()
//!     .await?
//!     .with_model(BedrockModel::Claude3Haiku)
//!     .with_options(CallOptions::new().with_max_tokens(512));
//! let response = bedrock
//!     .generate_content(&[Message::new_human_message("Tell me a story")])
//!     .await?;
//! println!("{}", response.choices[0].content);
//! # Ok(()) }
//! ```

/// Chains: the chain trait and the prompt-to-LLM chain.
pub mod chain;
/// Unified error types and utilities.
pub mod error;
/// Common LLM traits and call options.
pub mod language_models;
/// LLM implementations: AWS Bedrock.
pub mod llm;
/// Prompt templates and prompt arguments.
pub mod prompt;
/// Retrievers: multi-query retrieval.
pub mod retrievers;
/// Schemas: messages, documents, responses, tools, retriever trait.
pub mod schemas;

pub use error::{LangChainError, Result};

/// Type alias for message list
pub type Messages = Vec<crate::schemas::Message>;

/// Type alias for document list
pub type Documents = Vec<crate::schemas::Document>;
