// Typed settings
// Deserialized from the merged YAML value after validation

use serde::{Deserialize, Serialize};

use crate::rag::citation::CitationPolicy;
use crate::rag::gate::GradeScope;
use crate::rag::ranker::RankingStrategy;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RagSettings {
    pub server: ServerSettings,
    pub llm: LlmSettings,
    pub vector: VectorSettings,
    pub fulltext: FullTextSettings,
    pub retrieval: RetrievalSettings,
    pub pipeline: PipelineSettings,
    pub citations: CitationSettings,
    pub sources: SourceLinkSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Empty means the local development origins.
    pub cors_allowed_origins: Vec<String>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            cors_allowed_origins: Vec::new(),
        }
    }
}

/// Model id and sampling temperature for one role of the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelRole {
    pub model: String,
    pub temperature: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub base_url: String,
    pub api_key: Option<String>,
    pub expansion: ModelRole,
    /// Relevance judgments and source detection; kept at temperature 0.
    pub grading: ModelRole,
    pub generation: ModelRole,
    pub embedding_model: Option<String>,
    pub timeout_secs: u64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:1234".to_string(),
            api_key: None,
            expansion: ModelRole {
                model: "default".to_string(),
                temperature: 0.7,
            },
            grading: ModelRole {
                model: "default".to_string(),
                temperature: 0.0,
            },
            generation: ModelRole {
                model: "default".to_string(),
                temperature: 0.2,
            },
            embedding_model: None,
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorSettings {
    pub url: String,
    pub api_key: Option<String>,
    pub collection: String,
    /// 0 = pure lexical, 1 = pure semantic.
    pub alpha: f32,
    pub target_vector: Option<String>,
    pub fallback_vector: Option<String>,
    pub text_property: String,
    pub source_name_property: String,
    pub source_id_property: String,
    pub position_property: String,
}

impl Default for VectorSettings {
    fn default() -> Self {
        Self {
            url: "http://localhost:8080".to_string(),
            api_key: None,
            collection: "Documents".to_string(),
            alpha: 0.5,
            target_vector: Some("keywords_vector".to_string()),
            fallback_vector: Some("content_vector".to_string()),
            text_property: "content".to_string(),
            source_name_property: "source".to_string(),
            source_id_property: "file_id".to_string(),
            position_property: "chunk_index".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FullTextSettings {
    pub database_path: String,
    pub table: String,
}

impl Default for FullTextSettings {
    fn default() -> Self {
        Self {
            database_path: "data/fulltext.db".to_string(),
            table: "chunks_fts".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    pub top_k: usize,
    pub max_phrases: usize,
    pub combination_samples: usize,
    pub combination_seed: u64,
    pub vector_ranking: RankingStrategy,
    pub fulltext_ranking: RankingStrategy,
    pub detect_sources: bool,
    pub timeout_secs: u64,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            top_k: 5,
            max_phrases: 8,
            combination_samples: 1,
            combination_seed: 42,
            vector_ranking: RankingStrategy::Score,
            fulltext_ranking: RankingStrategy::Score,
            detect_sources: false,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    pub max_retries: u32,
    pub grade_scope: GradeScope,
    pub max_steps: usize,
    pub refusal_message: String,
    pub insufficient_info_phrase: String,
}

impl PipelineSettings {
    /// Graph steps the longest run allowed by `max_retries` takes: four per
    /// grading round, then synthesize and cite.
    pub fn required_steps(max_retries: u32) -> usize {
        4 * (max_retries as usize + 1) + 2
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            max_retries: 2,
            grade_scope: GradeScope::PerChannel,
            max_steps: 50,
            refusal_message: "Not enough information is available to answer this question."
                .to_string(),
            insufficient_info_phrase:
                "Not enough information is available to answer this question.".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CitationSettings {
    pub policy: CitationPolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceLinkSettings {
    pub download_base: String,
    pub database: String,
    pub collection: String,
}

impl Default for SourceLinkSettings {
    fn default() -> Self {
        Self {
            download_base: "http://localhost:8000/api/v1/download".to_string(),
            database: "documents".to_string(),
            collection: "pages".to_string(),
        }
    }
}
