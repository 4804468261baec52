// Refuse Node
// Terminal: retry budget spent without relevant results

use async_trait::async_trait;

use crate::graph::node::{GraphError, Node, NodeContext, NodeResult};
use crate::graph::state::{PipelineOutcome, PipelineState, StateUpdate};
use crate::llm::ChatMessage;

pub struct RefuseNode;

impl RefuseNode {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RefuseNode {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Node for RefuseNode {
    fn id(&self) -> &'static str {
        "refuse"
    }

    async fn execute(
        &self,
        state: &PipelineState,
        ctx: &NodeContext<'_>,
    ) -> Result<NodeResult, GraphError> {
        tracing::info!(
            "Refusing after {} grading round(s)",
            state.grading_rounds()
        );
        let text = ctx.settings.refusal_message.clone();
        Ok(NodeResult::finish(
            StateUpdate::new()
                .message(ChatMessage::assistant(text.clone()))
                .outcome(PipelineOutcome::Refusal { text }),
        ))
    }
}
