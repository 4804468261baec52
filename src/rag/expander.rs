// Keyword Expander
// Alternate search phrasings for a question

use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::SeedableRng;

use super::with_timeout;
use crate::core::config::settings::{ModelRole, RetrievalSettings};
use crate::llm::{ChatRequest, LlmProvider};

pub struct KeywordExpander {
    llm: Arc<dyn LlmProvider>,
    role: ModelRole,
    timeout: Duration,
}

impl KeywordExpander {
    pub fn new(llm: Arc<dyn LlmProvider>, role: ModelRole, timeout: Duration) -> Self {
        Self { llm, role, timeout }
    }

    /// Returns the model's keyword text, or `None` when the call fails or
    /// comes back blank. Callers then search with the question alone.
    pub async fn expand(&self, question: &str, previous: Option<&str>) -> Option<String> {
        let request = ChatRequest::prompt(expansion_prompt(question, previous)).with_role(&self.role);

        match with_timeout(self.timeout, self.llm.chat(request, &self.role.model)).await {
            Ok(text) if !text.trim().is_empty() => Some(text.trim().to_string()),
            Ok(_) => {
                tracing::warn!("Keyword expansion returned empty text");
                None
            }
            Err(err) => {
                tracing::warn!("Keyword expansion failed: {}", err);
                None
            }
        }
    }
}

pub fn expansion_prompt(question: &str, previous: Option<&str>) -> String {
    let mut prompt = String::from(
        "You extract search keywords for a document retrieval system.\n\
         Write short keyword phrases that are semantically related to the question, \
         in the same language as the question. Do not translate the question word for word.\n\
         Return only the phrases, separated by commas.\n",
    );

    if let Some(previous) = previous.filter(|p| !p.trim().is_empty()) {
        prompt.push_str(&format!(
            "\nThese keywords were already tried and found nothing relevant:\n{}\n\
             Suggest different keywords.\n",
            previous.trim()
        ));
    }

    prompt.push_str(&format!("\nQuestion: {}\nKeywords:", question.trim()));
    prompt
}

/// Turns expander output into the phrase set handed to retrieval.
#[derive(Debug, Clone)]
pub struct PhrasePlanner {
    max_phrases: usize,
    combination_samples: usize,
    seed: u64,
}

// Keeps the combination space small enough to enumerate.
const MAX_COMBINATION_KEYWORDS: usize = 12;

impl PhrasePlanner {
    pub fn new(max_phrases: usize, combination_samples: usize, seed: u64) -> Self {
        Self {
            max_phrases,
            combination_samples,
            seed,
        }
    }

    pub fn from_settings(settings: &RetrievalSettings) -> Self {
        Self::new(
            settings.max_phrases,
            settings.combination_samples,
            settings.combination_seed,
        )
    }

    /// Keyword phrases, then sampled keyword combinations, then the
    /// question itself. Never empty.
    pub fn plan(&self, question: &str, keywords: Option<&str>) -> Vec<String> {
        let split = keywords.map(split_keywords).unwrap_or_default();
        let keywords: Vec<String> = split.into_iter().take(self.max_phrases).collect();

        let mut phrases: Vec<String> = Vec::new();
        let mut push = |phrase: String| {
            let norm = phrase.to_lowercase();
            if !phrase.is_empty() && !phrases.iter().any(|p| p.to_lowercase() == norm) {
                phrases.push(phrase);
            }
        };

        for keyword in &keywords {
            push(keyword.clone());
        }
        for combination in self.sample_combinations(&keywords) {
            push(combination);
        }
        push(question.trim().to_string());

        if phrases.is_empty() {
            // Blank question and no keywords; retrieval still gets one phrase.
            phrases.push(question.to_string());
        }
        phrases
    }

    fn sample_combinations(&self, keywords: &[String]) -> Vec<String> {
        let n = keywords.len().min(MAX_COMBINATION_KEYWORDS);
        if n < 2 || self.combination_samples == 0 {
            return Vec::new();
        }

        // Every subset of size >= 2, in bitmask order.
        let combinations: Vec<String> = (1u32..(1 << n))
            .filter(|mask| mask.count_ones() >= 2)
            .map(|mask| {
                (0..n)
                    .filter(|i| mask & (1 << i) != 0)
                    .map(|i| keywords[i].as_str())
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .collect();

        let amount = self.combination_samples.min(combinations.len());
        let mut rng = StdRng::seed_from_u64(self.seed);
        rand::seq::index::sample(&mut rng, combinations.len(), amount)
            .into_iter()
            .map(|i| combinations[i].clone())
            .collect()
    }
}

/// Splits on commas (Latin and Arabic), semicolons and newlines.
pub fn split_keywords(text: &str) -> Vec<String> {
    text.split(|c| matches!(c, ',' | '،' | ';' | '\n'))
        .map(|s| s.trim().trim_matches(|c| matches!(c, '"' | '\'' | '-' | '*' | '.')).trim())
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::errors::ApiError;
    use crate::llm::ChatRequest;
    use async_trait::async_trait;

    struct FixedLlm(Result<String, ()>);

    #[async_trait]
    impl LlmProvider for FixedLlm {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn chat(&self, _request: ChatRequest, _model_id: &str) -> Result<String, ApiError> {
            self.0
                .clone()
                .map_err(|_| ApiError::Upstream("model offline".to_string()))
        }

        async fn embed(&self, _inputs: &[String], _model_id: &str) -> Result<Vec<Vec<f32>>, ApiError> {
            Ok(Vec::new())
        }
    }

    fn expander(reply: Result<String, ()>) -> KeywordExpander {
        KeywordExpander::new(
            Arc::new(FixedLlm(reply)),
            ModelRole {
                model: "m".to_string(),
                temperature: 0.7,
            },
            Duration::from_secs(5),
        )
    }

    #[tokio::test]
    async fn expand_trims_model_output() {
        let got = expander(Ok("  tax, exemption \n".to_string()))
            .expand("q", None)
            .await;
        assert_eq!(got.as_deref(), Some("tax, exemption"));
    }

    #[tokio::test]
    async fn expand_failure_or_blank_is_none() {
        assert!(expander(Err(())).expand("q", None).await.is_none());
        assert!(expander(Ok("   ".to_string())).expand("q", None).await.is_none());
    }

    #[test]
    fn retry_prompt_mentions_previous_keywords() {
        let first = expansion_prompt("What is VAT?", None);
        let retry = expansion_prompt("What is VAT?", Some("value added tax"));
        assert!(!first.contains("already tried"));
        assert!(retry.contains("already tried"));
        assert!(retry.contains("value added tax"));
        assert!(retry.ends_with("Question: What is VAT?\nKeywords:"));
    }

    #[test]
    fn split_handles_mixed_separators() {
        assert_eq!(
            split_keywords("مالیات، معافیت\n- tax rate; \"VAT\",,"),
            vec!["مالیات", "معافیت", "tax rate", "VAT"]
        );
    }

    #[test]
    fn plan_without_keywords_is_the_question() {
        let planner = PhrasePlanner::new(8, 3, 1);
        assert_eq!(planner.plan("What is VAT?", None), vec!["What is VAT?"]);
        assert_eq!(planner.plan("What is VAT?", Some("  ")), vec!["What is VAT?"]);
        assert_eq!(planner.plan("", None), vec![""]);
    }

    #[test]
    fn plan_caps_keywords_and_appends_question() {
        let planner = PhrasePlanner::new(2, 0, 1);
        let phrases = planner.plan("q?", Some("a, b, c, A"));
        assert_eq!(phrases, vec!["a", "b", "q?"]);
    }

    #[test]
    fn combinations_are_reproducible_and_multi_keyword() {
        let planner = PhrasePlanner::new(8, 2, 42);
        let first = planner.plan("q", Some("alpha, beta, gamma"));
        let second = planner.plan("q", Some("alpha, beta, gamma"));
        assert_eq!(first, second);
        assert_eq!(first.len(), 6);
        assert_eq!(first.last().map(String::as_str), Some("q"));
        for combination in &first[3..5] {
            assert!(combination.split(' ').count() >= 2);
        }
    }
}
