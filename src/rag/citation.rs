// Citation Renderer
// Inline **(N)** markers to superscript references plus a Sources list

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

use super::synthesizer::CitationIndex;
use crate::search::{SearchResult, SourceLinker};

/// How cited snippets are numbered in the rendered answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CitationPolicy {
    /// Keep the snippet ordinal; one Sources entry per cited snippet.
    #[default]
    PerSnippet,
    /// Number distinct sources by first appearance; one entry per source.
    BySource,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedAnswer {
    pub text: String,
    pub has_sources: bool,
}

static MARKER: OnceLock<Regex> = OnceLock::new();

// Mid-line markers take the horizontal whitespace before them; markers that
// open a line take the whitespace after them instead. Either way a stripped
// marker leaves no gap behind.
//
// Groups: 1 indent, 2 ordinal, 3 trailing gap (line start); 4 ordinal (mid-line).
fn marker() -> &'static Regex {
    MARKER.get_or_init(|| {
        Regex::new(r"(?m)^([ \t]*)\*\*\((\d+)\)\*\*([ \t]*)|[ \t]*\*\*\((\d+)\)\*\*")
            .expect("citation marker pattern is valid")
    })
}

const SUPERSCRIPT_DIGITS: [char; 10] = ['⁰', '¹', '²', '³', '⁴', '⁵', '⁶', '⁷', '⁸', '⁹'];

/// `12` renders as `⁽¹²⁾`; the parentheses keep adjacent references apart.
pub fn superscript(n: usize) -> String {
    let digits: String = n
        .to_string()
        .chars()
        .filter_map(|c| c.to_digit(10))
        .map(|d| SUPERSCRIPT_DIGITS[d as usize])
        .collect();
    format!("⁽{}⁾", digits)
}

#[derive(Debug, Clone)]
pub struct CitationRenderer {
    policy: CitationPolicy,
    linker: SourceLinker,
}

impl CitationRenderer {
    pub fn new(policy: CitationPolicy, linker: SourceLinker) -> Self {
        Self { policy, linker }
    }

    pub fn render(&self, answer: &str, index: &CitationIndex) -> RenderedAnswer {
        let mut cited: Vec<(usize, &SearchResult)> = Vec::new();
        let mut source_numbers: HashMap<&str, usize> = HashMap::new();

        let body = marker().replace_all(answer, |caps: &Captures| {
            let Some((ordinal, result)) = caps
                .get(2)
                .or_else(|| caps.get(4))
                .and_then(|m| m.as_str().parse::<usize>().ok())
                .and_then(|o| index.get(o).map(|r| (o, r)))
            else {
                return String::new();
            };
            let indent = caps.get(1).map_or("", |m| m.as_str());
            let gap = caps.get(3).map_or("", |m| m.as_str());

            let number = match self.policy {
                CitationPolicy::PerSnippet => {
                    if !cited.iter().any(|(n, _)| *n == ordinal) {
                        cited.push((ordinal, result));
                    }
                    ordinal
                }
                CitationPolicy::BySource => {
                    let next = source_numbers.len() + 1;
                    *source_numbers
                        .entry(result.source_id.as_str())
                        .or_insert_with(|| {
                            cited.push((next, result));
                            next
                        })
                }
            };
            format!("{}{}{}", indent, superscript(number), gap)
        });
        let body = body.trim_end();

        if cited.is_empty() {
            return RenderedAnswer {
                text: body.to_string(),
                has_sources: false,
            };
        }

        cited.sort_by_key(|(n, _)| *n);
        let sources = cited
            .iter()
            .map(|(n, result)| format!("{} {}", superscript(*n), self.linker.markdown(result)))
            .collect::<Vec<_>>()
            .join("\n");

        RenderedAnswer {
            text: format!("{}\n\nSources:\n{}", body, sources),
            has_sources: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::settings::SourceLinkSettings;
    use crate::search::Channel;
    use crate::test_support::hit;
    use proptest::prelude::*;

    fn renderer(policy: CitationPolicy) -> CitationRenderer {
        CitationRenderer::new(
            policy,
            SourceLinker::new(&SourceLinkSettings {
                download_base: "http://dl".to_string(),
                database: "db".to_string(),
                collection: "col".to_string(),
            }),
        )
    }

    fn index(sources: &[&str]) -> CitationIndex {
        sources
            .iter()
            .enumerate()
            .map(|(i, s)| hit(Channel::Vector, &format!("r{}", i + 1), "text", s, 1.0))
            .collect()
    }

    #[test]
    fn superscript_digits() {
        assert_eq!(superscript(1), "⁽¹⁾");
        assert_eq!(superscript(10), "⁽¹⁰⁾");
    }

    #[test]
    fn per_snippet_keeps_ordinals() {
        let idx = index(&["a.pdf", "b.pdf", "a.pdf"]);
        let out = renderer(CitationPolicy::PerSnippet)
            .render("VAT is 9% **(3)**. It applies to goods **(1)** **(3)**.", &idx);

        assert!(out.has_sources);
        assert_eq!(
            out.text,
            "VAT is 9%⁽³⁾. It applies to goods⁽¹⁾⁽³⁾.\n\nSources:\n\
             ⁽¹⁾ [a.pdf](http://dl/db/col/a.pdf/a.pdf-id/0)\n\
             ⁽³⁾ [a.pdf](http://dl/db/col/a.pdf/a.pdf-id/0)"
        );
    }

    #[test]
    fn by_source_renumbers_by_first_appearance() {
        let idx = index(&["a.pdf", "b.pdf", "a.pdf"]);
        let out = renderer(CitationPolicy::BySource)
            .render("First **(2)**, second **(3)**, again **(1)**.", &idx);

        assert_eq!(
            out.text,
            "First⁽¹⁾, second⁽²⁾, again⁽²⁾.\n\nSources:\n\
             ⁽¹⁾ [b.pdf](http://dl/db/col/b.pdf/b.pdf-id/0)\n\
             ⁽²⁾ [a.pdf](http://dl/db/col/a.pdf/a.pdf-id/0)"
        );
    }

    #[test]
    fn unknown_ordinals_are_stripped_cleanly() {
        let idx = index(&["a.pdf", "b.pdf", "c.pdf"]);
        let out = renderer(CitationPolicy::PerSnippet).render("Claim **(7)**. Other **(0)**", &idx);

        assert_eq!(out.text, "Claim. Other");
        assert!(!out.has_sources);

        let renderer = renderer(CitationPolicy::PerSnippet);
        assert_eq!(renderer.render("First.\n**(7)** Second.", &idx).text, "First.\nSecond.");
        assert_eq!(renderer.render("**(9)** Lead", &idx).text, "Lead");
        assert_eq!(renderer.render("Claim **(7)**, then more.", &idx).text, "Claim, then more.");
    }

    #[test]
    fn line_leading_markers_keep_their_spacing_when_valid() {
        let idx = index(&["a.pdf"]);
        let out = renderer(CitationPolicy::PerSnippet).render("Intro.\n**(1)** Detail.", &idx);
        assert!(out.text.starts_with("Intro.\n⁽¹⁾ Detail.\n\nSources:\n"));
    }

    #[test]
    fn answer_without_markers_has_no_sources_section() {
        let out = renderer(CitationPolicy::PerSnippet)
            .render("Not enough information is available.", &index(&["a.pdf"]));
        assert_eq!(out.text, "Not enough information is available.");
        assert!(!out.has_sources);
    }

    proptest! {
        #[test]
        fn only_indexed_ordinals_survive(
            ordinals in prop::collection::vec(0usize..12, 0..10),
            size in 0usize..6,
            by_source in any::<bool>(),
        ) {
            let names = ["a.pdf", "b.pdf", "c.pdf", "d.pdf", "e.pdf", "f.pdf"];
            let idx = index(&names[..size]);
            let text: String = ordinals
                .iter()
                .map(|o| format!("claim **({})**", o))
                .collect::<Vec<_>>()
                .join(" ");
            let policy = if by_source { CitationPolicy::BySource } else { CitationPolicy::PerSnippet };

            let out = renderer(policy).render(&text, &idx);

            prop_assert!(!marker().is_match(&out.text));
            let any_valid = ordinals.iter().any(|o| idx.contains(*o));
            prop_assert_eq!(out.has_sources, any_valid);
            if policy == CitationPolicy::PerSnippet {
                for o in &ordinals {
                    let rendered = out.text.contains(&superscript(*o));
                    prop_assert_eq!(rendered, idx.contains(*o));
                }
            }
        }
    }
}
