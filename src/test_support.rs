// Test doubles shared by unit tests

use std::sync::Mutex;

use async_trait::async_trait;

use crate::core::errors::ApiError;
use crate::llm::{ChatRequest, LlmProvider};
use crate::search::{
    Channel, FullTextQuery, FullTextSearch, SearchResult, SourceEntry, VectorQuery, VectorSearch,
};

type Responder = dyn Fn(&str) -> Result<String, ApiError> + Send + Sync;

/// LLM double answering from a closure over the prompt text.
pub(crate) struct ScriptedLlm {
    respond: Box<Responder>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedLlm {
    pub fn new(respond: impl Fn(&str) -> Result<String, ApiError> + Send + Sync + 'static) -> Self {
        Self {
            respond: Box::new(respond),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn replying(text: &str) -> Self {
        let text = text.to_string();
        Self::new(move |_| Ok(text.clone()))
    }

    pub fn failing() -> Self {
        Self::new(|_| Err(ApiError::Upstream("model offline".to_string())))
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmProvider for ScriptedLlm {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn chat(&self, request: ChatRequest, _model_id: &str) -> Result<String, ApiError> {
        let prompt = request
            .messages
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        self.calls.lock().unwrap().push(prompt.clone());
        (self.respond)(&prompt)
    }

    async fn embed(&self, inputs: &[String], _model_id: &str) -> Result<Vec<Vec<f32>>, ApiError> {
        Ok(inputs.iter().map(|_| vec![0.1, 0.2]).collect())
    }
}

type VectorResponder = dyn Fn(&VectorQuery) -> Result<Vec<SearchResult>, ApiError> + Send + Sync;
type FullTextResponder = dyn Fn(&FullTextQuery) -> Result<Vec<SearchResult>, ApiError> + Send + Sync;

pub(crate) struct CannedVector {
    respond: Box<VectorResponder>,
    queries: Mutex<Vec<VectorQuery>>,
}

impl CannedVector {
    pub fn new(
        respond: impl Fn(&VectorQuery) -> Result<Vec<SearchResult>, ApiError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            respond: Box::new(respond),
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn empty() -> Self {
        Self::new(|_| Ok(Vec::new()))
    }

    pub fn queries(&self) -> Vec<VectorQuery> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl VectorSearch for CannedVector {
    async fn ensure_collection(&self, _collection: &str) -> Result<(), ApiError> {
        Ok(())
    }

    async fn query(&self, _collection: &str, query: &VectorQuery) -> Result<Vec<SearchResult>, ApiError> {
        self.queries.lock().unwrap().push(query.clone());
        (self.respond)(query)
    }
}

pub(crate) struct CannedFullText {
    respond: Box<FullTextResponder>,
    sources: Vec<SourceEntry>,
    queries: Mutex<Vec<FullTextQuery>>,
}

impl CannedFullText {
    pub fn new(
        respond: impl Fn(&FullTextQuery) -> Result<Vec<SearchResult>, ApiError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            respond: Box::new(respond),
            sources: Vec::new(),
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn empty() -> Self {
        Self::new(|_| Ok(Vec::new()))
    }

    pub fn with_sources(mut self, sources: Vec<SourceEntry>) -> Self {
        self.sources = sources;
        self
    }

    pub fn queries(&self) -> Vec<FullTextQuery> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl FullTextSearch for CannedFullText {
    async fn ensure_index(&self) -> Result<(), ApiError> {
        Ok(())
    }

    async fn query(&self, query: &FullTextQuery) -> Result<Vec<SearchResult>, ApiError> {
        self.queries.lock().unwrap().push(query.clone());
        (self.respond)(query)
    }

    async fn list_sources(&self) -> Result<Vec<SourceEntry>, ApiError> {
        Ok(self.sources.clone())
    }
}

pub(crate) fn hit(channel: Channel, id: &str, text: &str, source: &str, score: f32) -> SearchResult {
    SearchResult {
        text: text.to_string(),
        source_id: format!("{}-id", source),
        source_name: source.to_string(),
        record_id: Some(id.to_string()),
        channel,
        relevance_score: score,
        position_hint: None,
    }
}
