// Cite Node
// Renders citations per channel and assembles the final answer

use async_trait::async_trait;

use crate::graph::node::{GraphError, Node, NodeContext, NodeResult};
use crate::graph::state::{Phase, PipelineOutcome, PipelineState, StateUpdate};
use crate::llm::ChatMessage;

pub struct CiteNode;

impl CiteNode {
    pub fn new() -> Self {
        Self
    }
}

impl Default for CiteNode {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Node for CiteNode {
    fn id(&self) -> &'static str {
        "cite"
    }

    fn name(&self) -> &'static str {
        "Citation Renderer"
    }

    async fn execute(
        &self,
        state: &PipelineState,
        ctx: &NodeContext<'_>,
    ) -> Result<NodeResult, GraphError> {
        if state.phase != Phase::Citing {
            return Err(GraphError::new(
                self.id(),
                format!("cannot render citations in phase {:?}", state.phase),
            ));
        }

        // Each channel keeps its own numbering; indices are never merged.
        let rendered: Vec<_> = state
            .answers
            .iter()
            .map(|answer| ctx.components.renderer.render(&answer.text, &answer.citations))
            .collect();

        let text = rendered
            .iter()
            .map(|r| r.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        let has_sources = rendered.iter().any(|r| r.has_sources);

        Ok(NodeResult::finish(
            StateUpdate::new()
                .phase(Phase::Answered)
                .message(ChatMessage::assistant(text.clone()))
                .outcome(PipelineOutcome::Answer { text, has_sources }),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::RagSettings;
    use crate::pipeline::PipelineComponents;
    use crate::rag::{ChannelAnswer, CitationIndex};
    use crate::search::Channel;
    use crate::test_support::{hit, CannedFullText, CannedVector, ScriptedLlm};
    use std::sync::Arc;

    #[tokio::test]
    async fn concatenates_channels_vector_first() {
        let settings = RagSettings::default();
        let components = PipelineComponents::new(
            &settings,
            Arc::new(ScriptedLlm::replying("")),
            Arc::new(CannedVector::empty()),
            Arc::new(CannedFullText::empty()),
        );
        let ctx = NodeContext {
            components: &components,
            settings: &settings.pipeline,
        };

        let citations: CitationIndex = vec![hit(Channel::Vector, "1", "t", "a.pdf", 0.9)]
            .into_iter()
            .collect();
        let mut state = PipelineState::new("r".to_string(), "q".to_string());
        state.apply(StateUpdate::new().phase(Phase::Citing).answers(vec![
            ChannelAnswer {
                channel: Channel::Vector,
                text: "Cited claim **(1)**".to_string(),
                citations,
            },
            ChannelAnswer {
                channel: Channel::FullText,
                text: "Nothing here **(1)**".to_string(),
                citations: CitationIndex::default(),
            },
        ]));

        let result = CiteNode::new().execute(&state, &ctx).await.unwrap();

        let Some(PipelineOutcome::Answer { text, has_sources }) = result.update.outcome else {
            panic!("expected an answer");
        };
        assert!(has_sources);
        assert!(text.starts_with("Cited claim⁽¹⁾\n\nSources:\n⁽¹⁾ [a.pdf]("));
        assert!(text.ends_with("\n\nNothing here"));
        assert_eq!(result.update.phase, Some(Phase::Answered));
    }
}
