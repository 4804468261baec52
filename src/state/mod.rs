use std::sync::Arc;
use std::time::Duration;

use crate::core::config::{AppPaths, ConfigService, RagSettings};
use crate::llm::{LlmProvider, OpenAiCompatProvider};
use crate::pipeline::Pipeline;
use crate::search::{FullTextSearch, SqliteFtsStore, VectorSearch, WeaviateClient};

pub mod error;

use error::InitializationError;

/// Application state shared across all routes.
#[derive(Clone)]
pub struct AppState {
    pub paths: Arc<AppPaths>,
    pub config: ConfigService,
    pub settings: Arc<RagSettings>,
    pub pipeline: Arc<Pipeline>,
}

impl AppState {
    /// Loads settings, connects the model endpoint and both search
    /// backends, then builds the pipeline graph.
    pub async fn initialize() -> Result<Arc<Self>, InitializationError> {
        let paths = Arc::new(AppPaths::new());
        let config = ConfigService::new(paths.clone());
        let settings = config
            .load_settings()
            .map_err(|e| InitializationError::Settings(anyhow::Error::new(e)))?;

        let llm: Arc<dyn LlmProvider> = Arc::new(
            OpenAiCompatProvider::from_settings(&settings.llm)
                .map_err(|e| InitializationError::Llm(anyhow::Error::new(e)))?,
        );

        let vector: Arc<dyn VectorSearch> = Arc::new(
            WeaviateClient::from_settings(
                &settings.vector,
                Duration::from_secs(settings.retrieval.timeout_secs),
            )
            .map_err(|e| InitializationError::Vector(anyhow::Error::new(e)))?,
        );

        let fulltext: Arc<dyn FullTextSearch> = Arc::new(
            SqliteFtsStore::from_settings(&settings.fulltext, &paths.project_root)
                .await
                .map_err(|e| InitializationError::FullText(anyhow::Error::new(e)))?,
        );

        Self::with_backends(paths, config, settings, llm, vector, fulltext)
    }

    /// Builds the state around already constructed backends.
    pub fn with_backends(
        paths: Arc<AppPaths>,
        config: ConfigService,
        settings: RagSettings,
        llm: Arc<dyn LlmProvider>,
        vector: Arc<dyn VectorSearch>,
        fulltext: Arc<dyn FullTextSearch>,
    ) -> Result<Arc<Self>, InitializationError> {
        let pipeline = Pipeline::new(settings.clone(), llm, vector, fulltext)
            .map_err(|e| InitializationError::Graph(anyhow::Error::new(e)))?;
        tracing::info!(
            "Pipeline ready: collection={} index={} max_retries={}",
            settings.vector.collection,
            settings.fulltext.table,
            settings.pipeline.max_retries
        );

        Ok(Arc::new(AppState {
            paths,
            config,
            settings: Arc::new(settings),
            pipeline: Arc::new(pipeline),
        }))
    }
}
