// Synthesize Node
// Both channel answers, generated concurrently

use async_trait::async_trait;

use crate::graph::node::{GraphError, Node, NodeContext, NodeResult};
use crate::graph::state::{Phase, PipelineState, StateUpdate};
use crate::search::Channel;

pub struct SynthesizeNode;

impl SynthesizeNode {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SynthesizeNode {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Node for SynthesizeNode {
    fn id(&self) -> &'static str {
        "synthesize"
    }

    fn name(&self) -> &'static str {
        "Answer Synthesizer"
    }

    async fn execute(
        &self,
        state: &PipelineState,
        ctx: &NodeContext<'_>,
    ) -> Result<NodeResult, GraphError> {
        if state.phase != Phase::Synthesizing {
            return Err(GraphError::new(
                self.id(),
                format!("cannot synthesize in phase {:?}", state.phase),
            ));
        }

        let synthesizer = &ctx.components.synthesizer;
        let (vector, fulltext) = tokio::join!(
            synthesizer.synthesize(&state.question, Channel::Vector, &state.ranked.vector),
            synthesizer.synthesize(&state.question, Channel::FullText, &state.ranked.fulltext),
        );

        Ok(NodeResult::next(
            StateUpdate::new()
                .phase(Phase::Citing)
                .answers(vec![vector, fulltext]),
        ))
    }
}
