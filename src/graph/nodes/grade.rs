// Grade Node
// Relevance gate: the only conditional edge in the graph

use async_trait::async_trait;

use crate::graph::node::{GraphError, Node, NodeContext, NodeResult};
use crate::graph::state::{Phase, PipelineState, StateUpdate};
use crate::rag::gate::{any_relevant, decide};
use crate::rag::{GateDecision, ParsePath};

pub struct GradeNode;

impl GradeNode {
    pub fn new() -> Self {
        Self
    }
}

impl Default for GradeNode {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Node for GradeNode {
    fn id(&self) -> &'static str {
        "grade"
    }

    fn name(&self) -> &'static str {
        "Relevance Gate"
    }

    async fn execute(
        &self,
        state: &PipelineState,
        ctx: &NodeContext<'_>,
    ) -> Result<NodeResult, GraphError> {
        let Phase::Grading { attempt } = state.phase else {
            return Err(GraphError::new(
                self.id(),
                format!("cannot grade in phase {:?}", state.phase),
            ));
        };

        let judgments = ctx
            .components
            .gate
            .judge(
                attempt,
                &state.question,
                &state.ranked.vector,
                &state.ranked.fulltext,
            )
            .await;

        let relevant = any_relevant(&judgments);
        let fallbacks = judgments
            .iter()
            .filter(|j| j.path == ParsePath::Fallback)
            .count();
        let decision = decide(relevant, state.return_raw, attempt, ctx.settings.max_retries);

        tracing::info!(
            "Attempt {}: relevant={} (fallback parses: {}), decision={:?}",
            attempt,
            relevant,
            fallbacks,
            decision
        );

        let next_phase = match decision {
            GateDecision::Retry => Phase::Expanding { attempt: attempt + 1 },
            GateDecision::Synthesize => Phase::Synthesizing,
            GateDecision::ReturnDocuments => Phase::RawDocs,
            GateDecision::Refuse => Phase::Refused,
        };

        Ok(NodeResult::branch(
            StateUpdate::new().phase(next_phase).judgments(judgments),
            decision.route(),
        ))
    }
}
