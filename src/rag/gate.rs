// Relevance Gate
// Binary relevance judgment and the answer / retry / refuse decision

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::with_timeout;
use crate::core::config::settings::ModelRole;
use crate::llm::{ChatRequest, LlmProvider};
use crate::search::{Channel, SearchResult};

/// Whether each channel is judged on its own or both together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GradeScope {
    #[default]
    PerChannel,
    Merged,
}

/// How a judgment was obtained from the model reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParsePath {
    /// `{"binary_score": "yes" | "no"}` decoded cleanly.
    Structured,
    /// Reply was not structured; affirmative substring check applied.
    Fallback,
    /// No usable reply (empty channel, model error or timeout).
    Unavailable,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Judgment {
    /// Grading round (the attempt number) the judgment belongs to.
    pub round: u32,
    /// `None` for a merged judgment.
    pub channel: Option<Channel>,
    pub relevant: bool,
    pub path: ParsePath,
}

impl Judgment {
    fn unavailable(round: u32, channel: Option<Channel>) -> Self {
        Self {
            round,
            channel,
            relevant: false,
            path: ParsePath::Unavailable,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateDecision {
    ReturnDocuments,
    Synthesize,
    Retry,
    Refuse,
}

impl GateDecision {
    /// Edge condition used by the graph.
    pub fn route(&self) -> &'static str {
        match self {
            GateDecision::ReturnDocuments => "raw",
            GateDecision::Synthesize => "answer",
            GateDecision::Retry => "retry",
            GateDecision::Refuse => "refuse",
        }
    }
}

/// `attempt` counts completed retries; 0 is the first pass.
pub fn decide(relevant: bool, return_raw: bool, attempt: u32, max_retries: u32) -> GateDecision {
    match (relevant, return_raw) {
        (true, true) => GateDecision::ReturnDocuments,
        (true, false) => GateDecision::Synthesize,
        (false, _) if attempt < max_retries => GateDecision::Retry,
        (false, _) => GateDecision::Refuse,
    }
}

#[derive(Deserialize)]
struct GradePayload {
    binary_score: Value,
}

fn structured_score(text: &str) -> Option<bool> {
    let payload: GradePayload = serde_json::from_str(text).ok()?;
    match &payload.binary_score {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "yes" => Some(true),
            "no" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Strict decode first (whole reply, then the outermost `{...}` span);
/// otherwise a case-insensitive search for "yes". Anything else is "no".
pub fn parse_judgment(raw: &str) -> (bool, ParsePath) {
    let trimmed = raw.trim();
    if let Some(score) = structured_score(trimmed) {
        return (score, ParsePath::Structured);
    }
    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) {
        if start < end {
            if let Some(score) = structured_score(&trimmed[start..=end]) {
                return (score, ParsePath::Structured);
            }
        }
    }

    let relevant = trimmed.to_lowercase().contains("yes");
    tracing::warn!(
        "Relevance reply was not structured, fallback parse gave {}: {:?}",
        if relevant { "yes" } else { "no" },
        truncate(trimmed, 120)
    );
    (relevant, ParsePath::Fallback)
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

pub fn grading_prompt(question: &str, document: &str) -> String {
    format!(
        "You are a grader assessing whether a retrieved document is relevant to a user question.\n\
         If the document contains keywords or meaning related to the question, grade it as relevant.\n\
         Answer with a JSON object only: {{\"binary_score\": \"yes\"}} or {{\"binary_score\": \"no\"}}.\n\n\
         Retrieved document:\n{}\n\nUser question: {}",
        document, question
    )
}

pub struct RelevanceGate {
    llm: Arc<dyn LlmProvider>,
    role: ModelRole,
    scope: GradeScope,
    timeout: Duration,
}

impl RelevanceGate {
    pub fn new(llm: Arc<dyn LlmProvider>, role: ModelRole, scope: GradeScope, timeout: Duration) -> Self {
        Self {
            llm,
            role,
            scope,
            timeout,
        }
    }

    /// Judges the top results. The set is relevant when any judgment says so.
    pub async fn judge(
        &self,
        round: u32,
        question: &str,
        vector: &[SearchResult],
        fulltext: &[SearchResult],
    ) -> Vec<Judgment> {
        match self.scope {
            GradeScope::PerChannel => {
                let calls = [(Channel::Vector, vector), (Channel::FullText, fulltext)]
                    .into_iter()
                    .map(|(channel, results)| async move {
                        match results.first() {
                            Some(top) => self.judge_text(round, Some(channel), question, &top.text).await,
                            None => Judgment::unavailable(round, Some(channel)),
                        }
                    });
                join_all(calls).await
            }
            GradeScope::Merged => {
                let merged: Vec<&str> = [vector.first(), fulltext.first()]
                    .into_iter()
                    .flatten()
                    .map(|r| r.text.as_str())
                    .collect();
                if merged.is_empty() {
                    return vec![Judgment::unavailable(round, None)];
                }
                vec![self.judge_text(round, None, question, &merged.join("\n\n")).await]
            }
        }
    }

    async fn judge_text(
        &self,
        round: u32,
        channel: Option<Channel>,
        question: &str,
        document: &str,
    ) -> Judgment {
        let request = ChatRequest::prompt(grading_prompt(question, document)).with_role(&self.role);
        match with_timeout(self.timeout, self.llm.chat(request, &self.role.model)).await {
            Ok(reply) => {
                let (relevant, path) = parse_judgment(&reply);
                Judgment {
                    round,
                    channel,
                    relevant,
                    path,
                }
            }
            Err(err) => {
                tracing::warn!("Relevance judgment failed, treating as not relevant: {}", err);
                Judgment::unavailable(round, channel)
            }
        }
    }
}

pub fn any_relevant(judgments: &[Judgment]) -> bool {
    judgments.iter().any(|j| j.relevant)
}
