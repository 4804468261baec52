// Rank Node
// Per-channel dedup, ordering and top-k cap

use async_trait::async_trait;

use crate::graph::node::{GraphError, Node, NodeContext, NodeResult};
use crate::graph::state::{Phase, PipelineState, StateUpdate};
use crate::rag::RetrievedSets;

pub struct RankNode;

impl RankNode {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RankNode {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Node for RankNode {
    fn id(&self) -> &'static str {
        "rank"
    }

    fn name(&self) -> &'static str {
        "Result Ranker"
    }

    async fn execute(
        &self,
        state: &PipelineState,
        ctx: &NodeContext<'_>,
    ) -> Result<NodeResult, GraphError> {
        let Phase::Ranking { attempt } = state.phase else {
            return Err(GraphError::new(
                self.id(),
                format!("cannot rank in phase {:?}", state.phase),
            ));
        };

        let k = state.top_k;
        let ranked = RetrievedSets {
            vector: ctx.components.vector_ranker.rank(&state.raw.vector, k),
            fulltext: ctx.components.fulltext_ranker.rank(&state.raw.fulltext, k),
        };
        tracing::debug!(
            "Ranked {} -> {} vector, {} -> {} full-text results",
            state.raw.vector.len(),
            ranked.vector.len(),
            state.raw.fulltext.len(),
            ranked.fulltext.len()
        );

        Ok(NodeResult::next(
            StateUpdate::new()
                .phase(Phase::Grading { attempt })
                .ranked(ranked),
        ))
    }
}
