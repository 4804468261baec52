// Answer Synthesizer
// Snippet-grounded answer for one channel

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use super::with_timeout;
use crate::core::config::settings::ModelRole;
use crate::llm::{ChatRequest, LlmProvider};
use crate::search::{Channel, SearchResult};

/// Snippet ordinal (1-based, as shown to the model) to the result it came from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CitationIndex {
    entries: BTreeMap<usize, SearchResult>,
}

impl CitationIndex {
    pub fn get(&self, ordinal: usize) -> Option<&SearchResult> {
        self.entries.get(&ordinal)
    }

    pub fn contains(&self, ordinal: usize) -> bool {
        self.entries.contains_key(&ordinal)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<SearchResult> for CitationIndex {
    fn from_iter<I: IntoIterator<Item = SearchResult>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .enumerate()
                .map(|(i, result)| (i + 1, result))
                .collect(),
        }
    }
}

pub const SNIPPET_END: &str = "<end_of_snippet>";

/// Numbered, delimited context plus the index that matches its numbering.
pub fn build_context(results: &[SearchResult]) -> (String, CitationIndex) {
    let index: CitationIndex = results.iter().cloned().collect();
    let context = index
        .entries
        .iter()
        .map(|(ordinal, result)| format!("Snippet {} : {} {}", ordinal, result.text.trim(), SNIPPET_END))
        .collect::<Vec<_>>()
        .join("\n");
    (context, index)
}

pub fn answer_prompt(question: &str, context: &str, insufficient_info_phrase: &str) -> String {
    format!(
        "Answer the question using only the numbered snippets below. \
         Answer in the same language as the question.\n\
         After every sentence that uses information from a snippet, cite it with its number \
         in exactly this form: **(N)**. Cite only snippet numbers that appear below.\n\
         If the snippets do not contain enough information to answer, reply with exactly this \
         sentence and nothing else: {}\n\n\
         Snippets:\n{}\n\nQuestion: {}\nAnswer:",
        insufficient_info_phrase, context, question
    )
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChannelAnswer {
    pub channel: Channel,
    pub text: String,
    pub citations: CitationIndex,
}

pub struct AnswerSynthesizer {
    llm: Arc<dyn LlmProvider>,
    role: ModelRole,
    timeout: Duration,
    insufficient_info_phrase: String,
}

impl AnswerSynthesizer {
    pub fn new(
        llm: Arc<dyn LlmProvider>,
        role: ModelRole,
        timeout: Duration,
        insufficient_info_phrase: String,
    ) -> Self {
        Self {
            llm,
            role,
            timeout,
            insufficient_info_phrase,
        }
    }

    pub async fn synthesize(&self, question: &str, channel: Channel, results: &[SearchResult]) -> ChannelAnswer {
        let (context, citations) = build_context(results);

        if citations.is_empty() {
            return ChannelAnswer {
                channel,
                text: self.insufficient_info_phrase.clone(),
                citations,
            };
        }

        let prompt = answer_prompt(question, &context, &self.insufficient_info_phrase);
        let request = ChatRequest::prompt(prompt).with_role(&self.role);

        let text = match with_timeout(self.timeout, self.llm.chat(request, &self.role.model)).await {
            Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
            Ok(_) => {
                tracing::warn!("Empty {} answer from model", channel);
                self.insufficient_info_phrase.clone()
            }
            Err(err) => {
                tracing::warn!("Answer synthesis failed for {} channel: {}", channel, err);
                self.insufficient_info_phrase.clone()
            }
        };

        ChannelAnswer {
            channel,
            text,
            citations,
        }
    }
}
