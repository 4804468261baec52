use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// One of the two independent retrieval backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Vector,
    FullText,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Vector => "vector",
            Channel::FullText => "fulltext",
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A retrieved passage. Scores are only comparable within one channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub text: String,
    /// Stable id of the originating file.
    pub source_id: String,
    /// Display name of the originating file (e.g. its filename).
    pub source_name: String,
    /// Backend-native record id, when the backend has one.
    pub record_id: Option<String>,
    pub channel: Channel,
    pub relevance_score: f32,
    /// Page or chunk index used for deep links.
    pub position_hint: Option<u32>,
}

impl SearchResult {
    pub fn dedup_key(&self) -> DedupKey {
        match self.record_id.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => DedupKey::Record(id.to_string()),
            _ => DedupKey::Content(content_hash(&self.text)),
        }
    }

    /// Restriction lists may name either the file name or the file id.
    pub fn matches_sources(&self, sources: &[String]) -> bool {
        sources.is_empty()
            || sources
                .iter()
                .any(|s| s == &self.source_name || s == &self.source_id)
    }
}

/// Identity used to collapse duplicate passages across phrases.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DedupKey {
    Record(String),
    Content(String),
}

/// sha256 over lowercased, whitespace-collapsed text.
pub fn content_hash(text: &str) -> String {
    let normalized = text
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    hex::encode(Sha256::digest(normalized.as_bytes()))
}

#[derive(Debug, Clone, PartialEq)]
pub struct VectorQuery {
    pub phrase: String,
    pub limit: usize,
    pub alpha: f32,
    pub target_vector: Option<String>,
    /// Precomputed query embedding; the backend vectorizes when absent.
    pub vector: Option<Vec<f32>>,
    pub sources: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FullTextQuery {
    pub phrase: String,
    pub limit: usize,
    pub sources: Vec<String>,
}

/// A distinct source known to a backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceEntry {
    pub id: String,
    pub name: String,
}
