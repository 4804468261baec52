// Dual Channel Retriever
// Per-phrase fan-out over the vector and full-text backends

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;

use super::with_timeout;
use crate::core::config::settings::VectorSettings;
use crate::llm::LlmProvider;
use crate::search::{FullTextQuery, FullTextSearch, SearchResult, VectorQuery, VectorSearch};

/// Raw, unranked results of one retrieval pass, in phrase order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RetrievedSets {
    pub vector: Vec<SearchResult>,
    pub fulltext: Vec<SearchResult>,
}

/// Vector query shape taken from configuration.
#[derive(Debug, Clone)]
pub struct VectorPlan {
    pub collection: String,
    pub alpha: f32,
    pub target_vector: Option<String>,
    pub fallback_vector: Option<String>,
}

impl VectorPlan {
    pub fn from_settings(settings: &VectorSettings) -> Self {
        Self {
            collection: settings.collection.clone(),
            alpha: settings.alpha,
            target_vector: settings.target_vector.clone(),
            fallback_vector: settings.fallback_vector.clone(),
        }
    }
}

/// Optional client-side query embedding.
pub struct Embedder {
    pub llm: Arc<dyn LlmProvider>,
    pub model: String,
}

pub struct DualChannelRetriever {
    vector: Arc<dyn VectorSearch>,
    fulltext: Arc<dyn FullTextSearch>,
    plan: VectorPlan,
    embedder: Option<Embedder>,
    timeout: Duration,
}

impl DualChannelRetriever {
    pub fn new(
        vector: Arc<dyn VectorSearch>,
        fulltext: Arc<dyn FullTextSearch>,
        plan: VectorPlan,
        timeout: Duration,
    ) -> Self {
        Self {
            vector,
            fulltext,
            plan,
            embedder: None,
            timeout,
        }
    }

    pub fn with_embedder(mut self, embedder: Option<Embedder>) -> Self {
        self.embedder = embedder;
        self
    }

    /// Queries both channels for every phrase concurrently. A failing phrase
    /// contributes nothing; its siblings are unaffected.
    pub async fn retrieve(&self, phrases: &[String], k: usize, sources: &[String]) -> RetrievedSets {
        let vectors = self.embed_phrases(phrases).await;

        let vector_calls = phrases.iter().enumerate().map(|(i, phrase)| {
            let embedding = vectors.as_ref().and_then(|v| v.get(i).cloned());
            self.query_vector(phrase, embedding, k, sources)
        });
        let fulltext_calls = phrases
            .iter()
            .map(|phrase| self.query_fulltext(phrase, k, sources));

        let (vector, fulltext) = tokio::join!(join_all(vector_calls), join_all(fulltext_calls));

        let sets = RetrievedSets {
            vector: vector.into_iter().flatten().collect(),
            fulltext: fulltext.into_iter().flatten().collect(),
        };
        tracing::info!(
            "Retrieved {} vector / {} full-text results for {} phrase(s)",
            sets.vector.len(),
            sets.fulltext.len(),
            phrases.len()
        );
        sets
    }

    async fn embed_phrases(&self, phrases: &[String]) -> Option<Vec<Vec<f32>>> {
        let embedder = self.embedder.as_ref()?;
        match with_timeout(self.timeout, embedder.llm.embed(phrases, &embedder.model)).await {
            Ok(vectors) if vectors.len() == phrases.len() => Some(vectors),
            Ok(vectors) => {
                tracing::warn!(
                    "Embedding returned {} vectors for {} phrases, using server-side vectorization",
                    vectors.len(),
                    phrases.len()
                );
                None
            }
            Err(err) => {
                tracing::warn!("Query embedding failed, using server-side vectorization: {}", err);
                None
            }
        }
    }

    async fn query_vector(
        &self,
        phrase: &str,
        embedding: Option<Vec<f32>>,
        k: usize,
        sources: &[String],
    ) -> Vec<SearchResult> {
        let primary = VectorQuery {
            phrase: phrase.to_string(),
            limit: k,
            alpha: self.plan.alpha,
            target_vector: self.plan.target_vector.clone(),
            vector: embedding,
            sources: sources.to_vec(),
        };

        let err = match with_timeout(self.timeout, self.vector.query(&self.plan.collection, &primary)).await {
            Ok(results) => return results,
            Err(err) => err,
        };
        tracing::warn!("Vector query failed for {:?}, retrying degraded: {}", phrase, err);

        // Alternate vector field, no server-side filter, server-side embedding.
        let degraded = VectorQuery {
            target_vector: self
                .plan
                .fallback_vector
                .clone()
                .or_else(|| self.plan.target_vector.clone()),
            vector: None,
            sources: Vec::new(),
            ..primary
        };

        match with_timeout(self.timeout, self.vector.query(&self.plan.collection, &degraded)).await {
            Ok(results) => results
                .into_iter()
                .filter(|r| r.matches_sources(sources))
                .collect(),
            Err(err) => {
                tracing::warn!("Degraded vector query failed for {:?}, skipping phrase: {}", phrase, err);
                Vec::new()
            }
        }
    }

    async fn query_fulltext(&self, phrase: &str, k: usize, sources: &[String]) -> Vec<SearchResult> {
        let primary = FullTextQuery {
            phrase: phrase.to_string(),
            limit: k,
            sources: sources.to_vec(),
        };

        let err = match with_timeout(self.timeout, self.fulltext.query(&primary)).await {
            Ok(results) => return results,
            Err(err) => err,
        };
        tracing::warn!("Full-text query failed for {:?}, retrying unfiltered: {}", phrase, err);

        let degraded = FullTextQuery {
            sources: Vec::new(),
            ..primary
        };

        match with_timeout(self.timeout, self.fulltext.query(&degraded)).await {
            Ok(results) => results
                .into_iter()
                .filter(|r| r.matches_sources(sources))
                .collect(),
            Err(err) => {
                tracing::warn!("Degraded full-text query failed for {:?}, skipping phrase: {}", phrase, err);
                Vec::new()
            }
        }
    }
}
