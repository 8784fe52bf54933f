use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use indexmap::IndexMap;
use serde_json::Value;

use crate::chain::{Chain, LLMChain};
use crate::error::RetrieverError;
use crate::language_models::llm::LLM;
use crate::prompt::{PromptArgs, PromptTemplate};
use crate::schemas::{Document, Retriever};

const DEFAULT_QUERY_TEMPLATE: &str = "You are an AI language model assistant. Your task is to generate 3 different versions of the given user question to retrieve relevant documents from a vector database. \nBy generating multiple perspectives on the user question, your goal is to help the user overcome some of the limitations of distance-based similarity search. Provide these alternative questions separated by newlines. \nOriginal question: {question}";

const DEFAULT_INPUT_KEY: &str = "question";

/// Configuration for Multi Query retriever
#[derive(Debug, Clone)]
pub struct MultiQueryRetrieverConfig {
    /// Also run the original query, after the generated ones
    pub include_original: bool,
    /// Chain input key that receives the user query
    pub input_key: String,
    /// Pause after each base retriever call
    pub delay: Duration,
    /// Keep the pause after the last query as well
    pub trailing_delay: bool,
}

impl Default for MultiQueryRetrieverConfig {
    fn default() -> Self {
        Self {
            include_original: false,
            input_key: DEFAULT_INPUT_KEY.to_string(),
            delay: Duration::ZERO,
            trailing_delay: true,
        }
    }
}

/// Multi Query retriever that asks a chain for query variations, runs each one
/// against a base retriever and merges the results.
pub struct MultiQueryRetriever {
    retriever: Arc<dyn Retriever>,
    chain: Arc<dyn Chain>,
    config: MultiQueryRetrieverConfig,
}

impl MultiQueryRetriever {
    /// Create a new multi query retriever
    pub fn new(retriever: Arc<dyn Retriever>, chain: Arc<dyn Chain>, include_original: bool) -> Self {
        Self::with_config(
            retriever,
            chain,
            MultiQueryRetrieverConfig {
                include_original,
                ..Default::default()
            },
        )
    }

    /// Create a multi query retriever backed by an [`LLMChain`] over `llm`.
    ///
    /// Without a prompt, the default template asks for three rewrites of
    /// `{question}`, one per line.
    pub fn from_llm<L: Into<Box<dyn LLM>>>(
        retriever: Arc<dyn Retriever>,
        llm: L,
        prompt: Option<PromptTemplate>,
        include_original: bool,
    ) -> Self {
        let prompt = prompt.unwrap_or_else(|| {
            PromptTemplate::new(DEFAULT_QUERY_TEMPLATE, vec![DEFAULT_INPUT_KEY.to_string()])
        });
        Self::new(
            retriever,
            Arc::new(LLMChain::new(llm, prompt)),
            include_original,
        )
    }

    /// Create a new multi query retriever with custom config
    pub fn with_config(
        retriever: Arc<dyn Retriever>,
        chain: Arc<dyn Chain>,
        config: MultiQueryRetrieverConfig,
    ) -> Self {
        Self {
            retriever,
            chain,
            config,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.config.delay = delay;
        self
    }

    pub fn with_input_key<S: Into<String>>(mut self, input_key: S) -> Self {
        self.config.input_key = input_key.into();
        self
    }

    pub fn with_trailing_delay(mut self, trailing_delay: bool) -> Self {
        self.config.trailing_delay = trailing_delay;
        self
    }

    pub fn config(&self) -> &MultiQueryRetrieverConfig {
        &self.config
    }

    /// Ask the chain for query variations, one per output line.
    ///
    /// Lines are returned exactly as split, blank ones included.
    pub async fn generate_queries(&self, query: &str) -> Result<Vec<String>, RetrieverError> {
        let mut input = PromptArgs::new();
        input.insert(
            self.config.input_key.clone(),
            Value::String(query.to_string()),
        );

        let text = self.chain.invoke(input).await?;
        Ok(text.split('\n').map(str::to_string).collect())
    }

    /// Run every query in order and concatenate the results.
    ///
    /// The first failing query aborts the whole run.
    pub async fn retrieve_documents(
        &self,
        queries: &[String],
    ) -> Result<Vec<Document>, RetrieverError> {
        let mut documents = Vec::new();
        for (i, query) in queries.iter().enumerate() {
            let mut docs = self.retriever.get_relevant_documents(query).await?;
            documents.append(&mut docs);

            let is_last = i + 1 == queries.len();
            if !self.config.delay.is_zero() && (!is_last || self.config.trailing_delay) {
                tokio::time::sleep(self.config.delay).await;
            }
        }
        Ok(documents)
    }
}

/// Drop repeated documents.
///
/// Documents are keyed by page content. A later document is dropped when the
/// kept one has the same score and metadata, otherwise it replaces the kept
/// one in place. Result order is the first-seen order of each content.
pub fn unique_documents(documents: Vec<Document>) -> Vec<Document> {
    let mut unique: IndexMap<String, Document> = IndexMap::with_capacity(documents.len());
    for document in documents {
        if let Some(kept) = unique.get(&document.page_content) {
            if kept.score == document.score && kept.metadata == document.metadata {
                continue;
            }
        }
        unique.insert(document.page_content.clone(), document);
    }
    unique.into_values().collect()
}

#[async_trait]
impl Retriever for MultiQueryRetriever {
    async fn get_relevant_documents(&self, query: &str) -> Result<Vec<Document>, RetrieverError> {
        let mut queries = self.generate_queries(query).await?;
        if self.config.include_original {
            queries.push(query.to_string());
        }
        log::debug!("multi query retriever queries: {:?}", queries);

        let documents = self.retrieve_documents(&queries).await?;
        let fetched = documents.len();
        let documents = unique_documents(documents);
        log::debug!(
            "multi query retriever kept {} of {} documents",
            documents.len(),
            fetched
        );

        Ok(documents)
    }
}
