use futures::Future;
use std::{pin::Pin, sync::Arc};
use tokio::sync::Mutex;

use crate::schemas::{FunctionCallBehavior, FunctionDefinition};

/// Callback receiving each streamed text fragment.
///
/// Returning `Err` aborts the stream; this is also how a caller cancels
/// an in-flight generation.
pub type StreamingFunc = Arc<
    Mutex<dyn FnMut(String) -> Pin<Box<dyn Future<Output = Result<(), String>> + Send>> + Send>,
>;

/// Per-call generation settings.
///
/// Every provider reads the subset it understands and ignores the rest.
#[derive(Clone, Default)]
pub struct CallOptions {
    /// AI21 `numResults`, Cohere `num_generations`.
    pub candidate_count: Option<usize>,
    /// Zero or unset falls back to the provider default; Anthropic requires it.
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub stop_words: Option<Vec<String>>,
    /// Anthropic and Nova stream through this when set.
    pub streaming_func: Option<StreamingFunc>,
    pub top_k: Option<usize>,
    pub top_p: Option<f32>,
    /// AI21 `countPenalty` scale.
    pub repetition_penalty: Option<f32>,
    /// Anthropic `tools`.
    pub functions: Option<Vec<FunctionDefinition>>,
    /// Anthropic `tool_choice`; `None` cannot be expressed and is an error.
    pub function_call_behavior: Option<FunctionCallBehavior>,
}

impl std::fmt::Debug for CallOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallOptions")
            .field("candidate_count", &self.candidate_count)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("stop_words", &self.stop_words)
            .field(
                "streaming_func",
                &self.streaming_func.as_ref().map(|_| "..."),
            )
            .field("top_k", &self.top_k)
            .field("top_p", &self.top_p)
            .field("repetition_penalty", &self.repetition_penalty)
            .field("functions", &self.functions)
            .field("function_call_behavior", &self.function_call_behavior)
            .finish()
    }
}

impl CallOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_candidate_count(mut self, candidate_count: usize) -> Self {
        self.candidate_count = Some(candidate_count);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_stop_words(mut self, stop_words: Vec<String>) -> Self {
        self.stop_words = Some(stop_words);
        self
    }

    pub fn with_streaming_func<F, Fut>(mut self, mut func: F) -> Self
    where
        F: FnMut(String) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), String>> + Send + 'static,
    {
        let func = Arc::new(Mutex::new(
            move |s: String| -> Pin<Box<dyn Future<Output = Result<(), String>> + Send>> {
                Box::pin(func(s))
            },
        ));

        self.streaming_func = Some(func);
        self
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = Some(top_k);
        self
    }

    pub fn with_top_p(mut self, top_p: f32) -> Self {
        self.top_p = Some(top_p);
        self
    }

    pub fn with_repetition_penalty(mut self, repetition_penalty: f32) -> Self {
        self.repetition_penalty = Some(repetition_penalty);
        self
    }

    pub fn with_functions(mut self, functions: Vec<FunctionDefinition>) -> Self {
        self.functions = Some(functions);
        self
    }

    pub fn with_function_call_behavior(mut self, behavior: FunctionCallBehavior) -> Self {
        self.function_call_behavior = Some(behavior);
        self
    }

    /// Max tokens if set to a positive value, otherwise `default`.
    pub fn max_tokens_or(&self, default: u32) -> u32 {
        match self.max_tokens {
            Some(max_tokens) if max_tokens > 0 => max_tokens,
            _ => default,
        }
    }

    pub fn merge_options(&mut self, incoming_options: CallOptions) {
        // Scalars: the incoming value wins when present
        self.candidate_count = incoming_options.candidate_count.or(self.candidate_count);
        self.max_tokens = incoming_options.max_tokens.or(self.max_tokens);
        self.temperature = incoming_options.temperature.or(self.temperature);
        self.top_k = incoming_options.top_k.or(self.top_k);
        self.top_p = incoming_options.top_p.or(self.top_p);
        self.repetition_penalty = incoming_options
            .repetition_penalty
            .or(self.repetition_penalty);
        self.function_call_behavior = incoming_options
            .function_call_behavior
            .or(self.function_call_behavior.take());

        if let Some(mut new_stop_words) = incoming_options.stop_words {
            if let Some(existing_stop_words) = &mut self.stop_words {
                existing_stop_words.append(&mut new_stop_words);
            } else {
                self.stop_words = Some(new_stop_words);
            }
        }

        if let Some(mut incoming_functions) = incoming_options.functions {
            if let Some(existing_functions) = &mut self.functions {
                existing_functions.append(&mut incoming_functions);
            } else {
                self.functions = Some(incoming_functions);
            }
        }

        self.streaming_func = incoming_options
            .streaming_func
            .or_else(|| self.streaming_func.take());
    }
}
