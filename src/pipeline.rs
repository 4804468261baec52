//! Request entry point: preconditions, optional source detection, then the
//! graph run that produces an answer, a document dump or a refusal.

use std::sync::Arc;
use std::time::Duration;

use tracing::Instrument;
use uuid::Uuid;

use crate::core::config::settings::PipelineSettings;
use crate::core::config::RagSettings;
use crate::core::errors::ApiError;
use crate::graph::{build_rag_graph, GraphRuntime, NodeContext, PipelineState};
use crate::llm::LlmProvider;
use crate::rag::{
    with_timeout, AnswerSynthesizer, CitationRenderer, DualChannelRetriever, Embedder,
    KeywordExpander, PhrasePlanner, RelevanceGate, ResultRanker, SourceDetector, VectorPlan,
};
use crate::search::{FullTextSearch, SourceLinker, VectorSearch};

pub use crate::graph::PipelineOutcome;

const MAX_TOP_K: usize = 200;

#[derive(Debug, Clone, Default)]
pub struct PipelineRequest {
    pub question: String,
    /// Used instead of model expansion on the first attempt.
    pub keyword_seed: Option<String>,
    /// Falls back to `retrieval.top_k`.
    pub top_k: Option<usize>,
    pub return_raw_documents: bool,
    /// File names or ids to restrict retrieval to.
    pub sources: Vec<String>,
}

impl PipelineRequest {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            ..Self::default()
        }
    }
}

/// The stage components the graph nodes call into.
pub struct PipelineComponents {
    pub expander: KeywordExpander,
    pub planner: PhrasePlanner,
    pub retriever: DualChannelRetriever,
    pub vector_ranker: ResultRanker,
    pub fulltext_ranker: ResultRanker,
    pub gate: RelevanceGate,
    pub synthesizer: AnswerSynthesizer,
    pub renderer: CitationRenderer,
}

impl PipelineComponents {
    pub fn new(
        settings: &RagSettings,
        llm: Arc<dyn LlmProvider>,
        vector: Arc<dyn VectorSearch>,
        fulltext: Arc<dyn FullTextSearch>,
    ) -> Self {
        let llm_timeout = Duration::from_secs(settings.llm.timeout_secs);
        let search_timeout = Duration::from_secs(settings.retrieval.timeout_secs);

        let embedder = settings.llm.embedding_model.clone().map(|model| Embedder {
            llm: llm.clone(),
            model,
        });

        Self {
            expander: KeywordExpander::new(llm.clone(), settings.llm.expansion.clone(), llm_timeout),
            planner: PhrasePlanner::from_settings(&settings.retrieval),
            retriever: DualChannelRetriever::new(
                vector,
                fulltext,
                VectorPlan::from_settings(&settings.vector),
                search_timeout,
            )
            .with_embedder(embedder),
            vector_ranker: ResultRanker::new(settings.retrieval.vector_ranking),
            fulltext_ranker: ResultRanker::new(settings.retrieval.fulltext_ranking),
            gate: RelevanceGate::new(
                llm.clone(),
                settings.llm.grading.clone(),
                settings.pipeline.grade_scope,
                llm_timeout,
            ),
            synthesizer: AnswerSynthesizer::new(
                llm,
                settings.llm.generation.clone(),
                llm_timeout,
                settings.pipeline.insufficient_info_phrase.clone(),
            ),
            renderer: CitationRenderer::new(
                settings.citations.policy,
                SourceLinker::new(&settings.sources),
            ),
        }
    }
}

pub struct Pipeline {
    settings: Arc<RagSettings>,
    components: PipelineComponents,
    graph: GraphRuntime,
    detector: SourceDetector,
    vector: Arc<dyn VectorSearch>,
    fulltext: Arc<dyn FullTextSearch>,
}

impl Pipeline {
    pub fn new(
        settings: RagSettings,
        llm: Arc<dyn LlmProvider>,
        vector: Arc<dyn VectorSearch>,
        fulltext: Arc<dyn FullTextSearch>,
    ) -> Result<Self, ApiError> {
        let required = PipelineSettings::required_steps(settings.pipeline.max_retries);
        if settings.pipeline.max_steps < required {
            return Err(ApiError::BadRequest(format!(
                "pipeline.max_steps is {} but {} retries need at least {}",
                settings.pipeline.max_steps, settings.pipeline.max_retries, required
            )));
        }
        let graph = build_rag_graph(settings.pipeline.max_steps)?;
        let components = PipelineComponents::new(&settings, llm.clone(), vector.clone(), fulltext.clone());
        let detector = SourceDetector::new(
            llm,
            settings.llm.grading.clone(),
            Duration::from_secs(settings.llm.timeout_secs),
        );

        Ok(Self {
            settings: Arc::new(settings),
            components,
            graph,
            detector,
            vector,
            fulltext,
        })
    }

    pub fn settings(&self) -> &RagSettings {
        &self.settings
    }

    /// Fails with `NotFound` when the vector collection or the full-text
    /// index is missing. Checked before any graph node runs.
    pub async fn ensure_ready(&self) -> Result<(), ApiError> {
        let timeout = Duration::from_secs(self.settings.retrieval.timeout_secs);
        with_timeout(
            timeout,
            self.vector.ensure_collection(&self.settings.vector.collection),
        )
        .await?;
        with_timeout(timeout, self.fulltext.ensure_index()).await?;
        Ok(())
    }

    pub async fn run(&self, request: PipelineRequest) -> Result<PipelineOutcome, ApiError> {
        let state = self.execute(request).await?;
        state
            .outcome
            .ok_or_else(|| ApiError::Internal("pipeline finished without an outcome".to_string()))
    }

    /// Like [`Pipeline::run`] but hands back the whole final state.
    pub async fn execute(&self, request: PipelineRequest) -> Result<PipelineState, ApiError> {
        let question = request.question.trim().to_string();
        if question.is_empty() {
            return Err(ApiError::BadRequest("question must not be empty".to_string()));
        }
        let top_k = request.top_k.unwrap_or(self.settings.retrieval.top_k);
        if top_k == 0 || top_k > MAX_TOP_K {
            return Err(ApiError::BadRequest(format!(
                "top_k must be between 1 and {}",
                MAX_TOP_K
            )));
        }

        let request_id = Uuid::new_v4().to_string();
        let span = tracing::info_span!("pipeline", request_id = %request_id);

        async move {
            self.ensure_ready().await?;

            let sources = self.resolve_sources(&question, request.sources).await;
            let mut state = PipelineState::new(request_id, question)
                .with_keyword_seed(request.keyword_seed)
                .with_top_k(top_k)
                .with_return_raw(request.return_raw_documents)
                .with_sources(sources);

            let ctx = NodeContext {
                components: &self.components,
                settings: &self.settings.pipeline,
            };
            self.graph.run(&mut state, &ctx).await?;

            if let Some(outcome) = &state.outcome {
                tracing::info!(
                    "Pipeline finished: kind={} has_sources={} rounds={}",
                    outcome.kind(),
                    outcome.has_sources(),
                    state.grading_rounds()
                );
            }
            Ok::<_, ApiError>(state)
        }
        .instrument(span)
        .await
    }

    async fn resolve_sources(&self, question: &str, requested: Vec<String>) -> Vec<String> {
        let requested: Vec<String> = requested
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if !requested.is_empty() || !self.settings.retrieval.detect_sources {
            return requested;
        }

        let timeout = Duration::from_secs(self.settings.retrieval.timeout_secs);
        match with_timeout(timeout, self.fulltext.list_sources()).await {
            Ok(known) => self.detector.detect(question, &known).await,
            Err(err) => {
                tracing::warn!("Could not list sources for detection: {}", err);
                Vec::new()
            }
        }
    }
}
