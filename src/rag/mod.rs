//! Retrieval-grading-generation components.
//!
//! Each component is usable on its own; the graph nodes in `crate::graph`
//! wire them into the pipeline.

pub mod citation;
pub mod detector;
pub mod expander;
pub mod gate;
pub mod ranker;
pub mod retriever;
pub mod synthesizer;

use std::future::Future;
use std::time::Duration;

use crate::core::errors::ApiError;

pub use citation::{CitationPolicy, CitationRenderer, RenderedAnswer};
pub use detector::SourceDetector;
pub use expander::{KeywordExpander, PhrasePlanner};
pub use gate::{GateDecision, GradeScope, Judgment, ParsePath, RelevanceGate};
pub use ranker::{RankingStrategy, ResultRanker};
pub use retriever::{DualChannelRetriever, Embedder, RetrievedSets, VectorPlan};
pub use synthesizer::{AnswerSynthesizer, ChannelAnswer, CitationIndex};

/// Runs an external call under a deadline, mapping expiry to `ApiError::Timeout`.
pub(crate) async fn with_timeout<T, F>(limit: Duration, call: F) -> Result<T, ApiError>
where
    F: Future<Output = Result<T, ApiError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(ApiError::Timeout(limit.as_secs())),
    }
}
