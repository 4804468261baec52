// Graph State
// PipelineState, the per-node StateUpdate and the merge rules between them

use serde::{Deserialize, Serialize};

use crate::llm::ChatMessage;
use crate::rag::{ChannelAnswer, Judgment, RetrievedSets};

/// Where the request is in the retrieve / grade / answer loop.
///
/// `attempt` is the number of retries already taken; it only grows, and only
/// through `Grading -> Expanding`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "phase")]
pub enum Phase {
    #[default]
    Idle,
    Expanding { attempt: u32 },
    Retrieving { attempt: u32 },
    Ranking { attempt: u32 },
    Grading { attempt: u32 },
    Synthesizing,
    Citing,
    Answered,
    Refused,
    RawDocs,
}

impl Phase {
    pub fn attempt(&self) -> Option<u32> {
        match self {
            Phase::Idle => Some(0),
            Phase::Expanding { attempt }
            | Phase::Retrieving { attempt }
            | Phase::Ranking { attempt }
            | Phase::Grading { attempt } => Some(*attempt),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Answered | Phase::Refused | Phase::RawDocs)
    }
}

/// What the user gets back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum PipelineOutcome {
    Answer { text: String, has_sources: bool },
    RawDocuments { text: String },
    Refusal { text: String },
}

impl PipelineOutcome {
    pub fn text(&self) -> &str {
        match self {
            PipelineOutcome::Answer { text, .. }
            | PipelineOutcome::RawDocuments { text }
            | PipelineOutcome::Refusal { text } => text,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            PipelineOutcome::Answer { .. } => "answer",
            PipelineOutcome::RawDocuments { .. } => "documents",
            PipelineOutcome::Refusal { .. } => "refusal",
        }
    }

    pub fn has_sources(&self) -> bool {
        matches!(self, PipelineOutcome::Answer { has_sources: true, .. })
    }
}

/// Request-scoped state threaded through the graph.
///
/// Nodes only read it. The runtime applies each node's [`StateUpdate`]:
/// `history` and `judgments` append, everything else is replaced.
#[derive(Debug, Clone)]
pub struct PipelineState {
    pub request_id: String,

    // Request input, fixed for the whole run
    pub question: String,
    pub keyword_seed: Option<String>,
    pub top_k: usize,
    pub return_raw: bool,
    pub sources: Vec<String>,

    pub phase: Phase,
    pub history: Vec<ChatMessage>,

    // Current attempt
    pub keywords: Option<String>,
    pub phrases: Vec<String>,
    pub raw: RetrievedSets,
    pub ranked: RetrievedSets,
    pub judgments: Vec<Judgment>,

    pub answers: Vec<ChannelAnswer>,
    pub outcome: Option<PipelineOutcome>,
}

impl PipelineState {
    pub fn new(request_id: String, question: String) -> Self {
        Self {
            request_id,
            history: vec![ChatMessage::user(question.clone())],
            question,
            keyword_seed: None,
            top_k: 5,
            return_raw: false,
            sources: Vec::new(),
            phase: Phase::Idle,
            keywords: None,
            phrases: Vec::new(),
            raw: RetrievedSets::default(),
            ranked: RetrievedSets::default(),
            judgments: Vec::new(),
            answers: Vec::new(),
            outcome: None,
        }
    }

    pub fn with_keyword_seed(mut self, seed: Option<String>) -> Self {
        self.keyword_seed = seed.filter(|s| !s.trim().is_empty());
        self
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_return_raw(mut self, return_raw: bool) -> Self {
        self.return_raw = return_raw;
        self
    }

    pub fn with_sources(mut self, sources: Vec<String>) -> Self {
        self.sources = sources;
        self
    }

    /// Number of relevance judgments recorded so far.
    pub fn grading_rounds(&self) -> usize {
        self.judgments
            .iter()
            .map(|j| j.round)
            .max()
            .map(|r| r as usize + 1)
            .unwrap_or(0)
    }

    pub fn apply(&mut self, update: StateUpdate) {
        let StateUpdate {
            phase,
            history,
            keywords,
            phrases,
            raw,
            ranked,
            judgments,
            answers,
            outcome,
        } = update;

        if let Some(phase) = phase {
            self.phase = phase;
        }
        self.history.extend(history);
        if let Some(keywords) = keywords {
            self.keywords = keywords;
        }
        if let Some(phrases) = phrases {
            self.phrases = phrases;
        }
        if let Some(raw) = raw {
            self.raw = raw;
        }
        if let Some(ranked) = ranked {
            self.ranked = ranked;
        }
        self.judgments.extend(judgments);
        if let Some(answers) = answers {
            self.answers = answers;
        }
        if let Some(outcome) = outcome {
            self.outcome = Some(outcome);
        }
    }
}

/// Partial state returned by a node. Unset fields leave the state alone.
#[derive(Debug, Clone, Default)]
pub struct StateUpdate {
    pub phase: Option<Phase>,
    pub history: Vec<ChatMessage>,
    /// `Some(None)` clears keywords left over from an earlier attempt.
    pub keywords: Option<Option<String>>,
    pub phrases: Option<Vec<String>>,
    pub raw: Option<RetrievedSets>,
    pub ranked: Option<RetrievedSets>,
    pub judgments: Vec<Judgment>,
    pub answers: Option<Vec<ChannelAnswer>>,
    pub outcome: Option<PipelineOutcome>,
}

impl StateUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(mut self, phase: Phase) -> Self {
        self.phase = Some(phase);
        self
    }

    pub fn message(mut self, message: ChatMessage) -> Self {
        self.history.push(message);
        self
    }

    pub fn keywords(mut self, keywords: Option<String>) -> Self {
        self.keywords = Some(keywords);
        self
    }

    pub fn phrases(mut self, phrases: Vec<String>) -> Self {
        self.phrases = Some(phrases);
        self
    }

    pub fn raw(mut self, raw: RetrievedSets) -> Self {
        self.raw = Some(raw);
        self
    }

    pub fn ranked(mut self, ranked: RetrievedSets) -> Self {
        self.ranked = Some(ranked);
        self
    }

    pub fn judgments(mut self, judgments: Vec<Judgment>) -> Self {
        self.judgments.extend(judgments);
        self
    }

    pub fn answers(mut self, answers: Vec<ChannelAnswer>) -> Self {
        self.answers = Some(answers);
        self
    }

    pub fn outcome(mut self, outcome: PipelineOutcome) -> Self {
        self.outcome = Some(outcome);
        self
    }
}
