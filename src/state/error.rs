use thiserror::Error;

#[derive(Debug, Error)]
pub enum InitializationError {
    #[error("Failed to load settings: {0}")]
    Settings(#[source] anyhow::Error),

    #[error("Failed to initialize LLM provider: {0}")]
    Llm(#[source] anyhow::Error),

    #[error("Failed to initialize vector backend: {0}")]
    Vector(#[source] anyhow::Error),

    #[error("Failed to open full-text index: {0}")]
    FullText(#[source] anyhow::Error),

    #[error("Failed to build pipeline graph: {0}")]
    Graph(#[source] anyhow::Error),
}
