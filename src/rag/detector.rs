// Source Detector
// Guesses which known files a question is about

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use super::with_timeout;
use crate::core::config::settings::ModelRole;
use crate::llm::{ChatRequest, LlmProvider};
use crate::search::SourceEntry;

pub struct SourceDetector {
    llm: Arc<dyn LlmProvider>,
    role: ModelRole,
    timeout: Duration,
}

impl SourceDetector {
    pub fn new(llm: Arc<dyn LlmProvider>, role: ModelRole, timeout: Duration) -> Self {
        Self { llm, role, timeout }
    }

    /// Names of the sources the model picked. Empty means "no restriction".
    pub async fn detect(&self, question: &str, known: &[SourceEntry]) -> Vec<String> {
        if known.is_empty() {
            return Vec::new();
        }

        let request = ChatRequest::prompt(detection_prompt(question, known)).with_role(&self.role);
        match with_timeout(self.timeout, self.llm.chat(request, &self.role.model)).await {
            Ok(reply) => {
                let names = pick_sources(&reply, known);
                tracing::info!("Detected {} source(s) for question", names.len());
                names
            }
            Err(err) => {
                tracing::warn!("Source detection failed: {}", err);
                Vec::new()
            }
        }
    }
}

pub fn detection_prompt(question: &str, known: &[SourceEntry]) -> String {
    let listing = known
        .iter()
        .map(|s| format!("{}: {}", s.id, s.name))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "Below is a list of documents as `id: name`.\n{}\n\n\
         Which documents are likely to answer the question? Reply with their ids separated \
         by commas, or with `none` if no document stands out.\n\nQuestion: {}",
        listing, question
    )
}

/// Keeps only ids that exist, in listing order, mapped to names.
pub fn pick_sources(reply: &str, known: &[SourceEntry]) -> Vec<String> {
    let picked: HashSet<&str> = reply
        .split(|c: char| c == ',' || c == '،' || c.is_whitespace())
        .map(|s| s.trim_matches(|c: char| matches!(c, '`' | '"' | '\'' | '[' | ']' | '.')))
        .filter(|s| !s.is_empty())
        .collect();

    known
        .iter()
        .filter(|s| picked.contains(s.id.as_str()))
        .map(|s| s.name.clone())
        .collect()
}
