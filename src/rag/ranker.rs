// Result Ranker
// Dedup, order and cap one channel's raw results

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::search::{DedupKey, SearchResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankingStrategy {
    /// Descending relevance score.
    #[default]
    Score,
    /// Passages hit most often across phrases, from the most hit sources.
    Frequency,
}

#[derive(Debug, Clone, Copy)]
pub struct ResultRanker {
    strategy: RankingStrategy,
}

impl ResultRanker {
    pub fn new(strategy: RankingStrategy) -> Self {
        Self { strategy }
    }

    pub fn rank(&self, results: &[SearchResult], k: usize) -> Vec<SearchResult> {
        match self.strategy {
            RankingStrategy::Score => rank_by_score(results, k),
            RankingStrategy::Frequency => rank_by_frequency(results, k),
        }
    }
}

impl Default for ResultRanker {
    fn default() -> Self {
        Self::new(RankingStrategy::Score)
    }
}

// NaN sorts after every real score.
fn by_score_desc(a: &SearchResult, b: &SearchResult) -> Ordering {
    match (a.relevance_score.is_nan(), b.relevance_score.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => b
            .relevance_score
            .partial_cmp(&a.relevance_score)
            .unwrap_or(Ordering::Equal),
    }
}

/// Stable sort by score, then keep the first copy of each dedup key.
///
/// Sorting before dedup keeps the best-scored copy of a duplicate and the
/// first-seen copy on equal scores.
pub fn rank_by_score(results: &[SearchResult], k: usize) -> Vec<SearchResult> {
    let mut ordered: Vec<&SearchResult> = results.iter().collect();
    ordered.sort_by(|a, b| by_score_desc(a, b));

    let mut seen: HashSet<DedupKey> = HashSet::new();
    ordered
        .into_iter()
        .filter(|r| seen.insert(r.dedup_key()))
        .take(k)
        .cloned()
        .collect()
}

/// Counts source and passage hits across all phrases; emits passages that
/// are among the `k` most frequent keys and come from one of the `k` most
/// frequent sources. Ties keep first-seen order.
pub fn rank_by_frequency(results: &[SearchResult], k: usize) -> Vec<SearchResult> {
    if results.is_empty() || k == 0 {
        return Vec::new();
    }

    let mut source_counts: Vec<(String, usize)> = Vec::new();
    let mut source_slot: HashMap<String, usize> = HashMap::new();
    let mut key_counts: Vec<(DedupKey, usize)> = Vec::new();
    let mut key_slot: HashMap<DedupKey, usize> = HashMap::new();
    let mut first_by_key: HashMap<DedupKey, &SearchResult> = HashMap::new();

    for result in results {
        let slot = *source_slot.entry(result.source_id.clone()).or_insert_with(|| {
            source_counts.push((result.source_id.clone(), 0));
            source_counts.len() - 1
        });
        source_counts[slot].1 += 1;

        let key = result.dedup_key();
        let slot = *key_slot.entry(key.clone()).or_insert_with(|| {
            key_counts.push((key.clone(), 0));
            key_counts.len() - 1
        });
        key_counts[slot].1 += 1;
        first_by_key.entry(key).or_insert(result);
    }

    // sort_by is stable, so equal counts stay in first-seen order.
    source_counts.sort_by(|a, b| b.1.cmp(&a.1));
    key_counts.sort_by(|a, b| b.1.cmp(&a.1));

    let top_sources: HashSet<&str> = source_counts
        .iter()
        .take(k)
        .map(|(source, _)| source.as_str())
        .collect();

    key_counts
        .iter()
        .take(k)
        .filter_map(|(key, _)| first_by_key.get(key).copied())
        .filter(|r| top_sources.contains(r.source_id.as_str()))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::Channel;
    use proptest::prelude::*;

    fn result(id: Option<&str>, text: &str, source: &str, score: f32) -> SearchResult {
        SearchResult {
            text: text.to_string(),
            source_id: source.to_string(),
            source_name: format!("{}.pdf", source),
            record_id: id.map(String::from),
            channel: Channel::Vector,
            relevance_score: score,
            position_hint: None,
        }
    }

    #[test]
    fn empty_input_is_empty_output() {
        assert!(rank_by_score(&[], 5).is_empty());
        assert!(rank_by_frequency(&[], 5).is_empty());
    }

    #[test]
    fn duplicate_keeps_higher_scored_copy() {
        let raw = vec![
            result(Some("a"), "first phrase copy", "s1", 0.4),
            result(Some("b"), "other", "s1", 0.6),
            result(Some("a"), "second phrase copy", "s1", 0.9),
        ];
        let ranked = rank_by_score(&raw, 10);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].text, "second phrase copy");
        assert_eq!(ranked[1].record_id.as_deref(), Some("b"));
    }

    #[test]
    fn duplicate_with_equal_score_keeps_first_seen() {
        let raw = vec![
            result(None, "Same  text", "s1", 0.5),
            result(None, "same text", "s2", 0.5),
        ];
        let ranked = rank_by_score(&raw, 10);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].source_id, "s1");
    }

    #[test]
    fn truncates_to_k_and_puts_nan_last() {
        let raw = vec![
            result(Some("n"), "nan", "s", f32::NAN),
            result(Some("a"), "a", "s", 0.1),
            result(Some("b"), "b", "s", 0.3),
        ];
        let ranked = rank_by_score(&raw, 2);
        let ids: Vec<_> = ranked.iter().filter_map(|r| r.record_id.as_deref()).collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[test]
    fn frequency_prefers_repeated_passages_from_busy_sources() {
        let raw = vec![
            result(Some("x"), "x", "rare", 0.99),
            result(Some("a"), "a", "busy", 0.1),
            result(Some("b"), "b", "busy", 0.2),
            result(Some("a"), "a", "busy", 0.1),
            result(Some("b"), "b", "busy", 0.2),
            result(Some("a"), "a", "busy", 0.1),
        ];
        let ranked = rank_by_frequency(&raw, 1);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].record_id.as_deref(), Some("a"));

        let ranked = rank_by_frequency(&raw, 2);
        let ids: Vec<_> = ranked.iter().filter_map(|r| r.record_id.as_deref()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn ranker_dispatches_on_strategy() {
        let raw = vec![
            result(Some("a"), "a", "s", 0.1),
            result(Some("b"), "b", "s", 0.9),
        ];
        let by_score = ResultRanker::new(RankingStrategy::Score).rank(&raw, 1);
        assert_eq!(by_score[0].record_id.as_deref(), Some("b"));
        let by_frequency = ResultRanker::new(RankingStrategy::Frequency).rank(&raw, 1);
        assert_eq!(by_frequency[0].record_id.as_deref(), Some("a"));
    }

    fn arb_results() -> impl Strategy<Value = Vec<SearchResult>> {
        prop::collection::vec(
            (
                prop::option::of(0u8..6),
                0u8..6,
                0u8..3,
                prop_oneof![Just(0.5f32), -1.0f32..1.0],
            ),
            0..40,
        )
        .prop_map(|items| {
            items
                .into_iter()
                .map(|(id, text, source, score)| {
                    let id = id.map(|i| format!("r{}", i));
                    result(id.as_deref(), &format!("text {}", text), &format!("s{}", source), score)
                })
                .collect()
        })
    }

    proptest! {
        #[test]
        fn ranking_is_idempotent(raw in arb_results(), k in 0usize..12) {
            let once = rank_by_score(&raw, k);
            let twice = rank_by_score(&once, k);
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn ranked_sets_never_repeat_a_key(raw in arb_results(), k in 0usize..12) {
            for ranked in [rank_by_score(&raw, k), rank_by_frequency(&raw, k)] {
                let mut keys = HashSet::new();
                for r in &ranked {
                    prop_assert!(keys.insert(r.dedup_key()));
                }
                prop_assert!(ranked.len() <= k);
            }
        }

        #[test]
        fn score_ranking_is_descending(raw in arb_results(), k in 0usize..12) {
            let ranked = rank_by_score(&raw, k);
            for pair in ranked.windows(2) {
                prop_assert!(pair[0].relevance_score >= pair[1].relevance_score);
            }
        }
    }
}
