// Retrieve Node
// Dual-channel fan-out for the current phrase set

use async_trait::async_trait;

use crate::graph::node::{GraphError, Node, NodeContext, NodeResult};
use crate::graph::state::{Phase, PipelineState, StateUpdate};

pub struct RetrieveNode;

impl RetrieveNode {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RetrieveNode {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Node for RetrieveNode {
    fn id(&self) -> &'static str {
        "retrieve"
    }

    fn name(&self) -> &'static str {
        "Dual Channel Retriever"
    }

    async fn execute(
        &self,
        state: &PipelineState,
        ctx: &NodeContext<'_>,
    ) -> Result<NodeResult, GraphError> {
        let Phase::Retrieving { attempt } = state.phase else {
            return Err(GraphError::new(
                self.id(),
                format!("cannot retrieve in phase {:?}", state.phase),
            ));
        };

        let raw = ctx
            .components
            .retriever
            .retrieve(&state.phrases, state.top_k, &state.sources)
            .await;

        Ok(NodeResult::next(
            StateUpdate::new()
                .phase(Phase::Ranking { attempt })
                .raw(raw),
        ))
    }
}
