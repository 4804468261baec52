// Expand Node
// Keyword expansion and phrase planning for one retrieval attempt

use async_trait::async_trait;

use crate::graph::node::{GraphError, Node, NodeContext, NodeResult};
use crate::graph::state::{Phase, PipelineState, StateUpdate};
use crate::llm::ChatMessage;

pub struct ExpandNode;

impl ExpandNode {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ExpandNode {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Node for ExpandNode {
    fn id(&self) -> &'static str {
        "expand_keywords"
    }

    fn name(&self) -> &'static str {
        "Keyword Expander"
    }

    async fn execute(
        &self,
        state: &PipelineState,
        ctx: &NodeContext<'_>,
    ) -> Result<NodeResult, GraphError> {
        let attempt = match state.phase {
            Phase::Idle => 0,
            Phase::Expanding { attempt } => attempt,
            other => {
                return Err(GraphError::new(
                    self.id(),
                    format!("cannot expand keywords in phase {:?}", other),
                ))
            }
        };

        let keywords = match (&state.keyword_seed, attempt) {
            (Some(seed), 0) => {
                tracing::info!("Using caller-provided keyword seed");
                Some(seed.clone())
            }
            _ => {
                let previous = (attempt > 0).then(|| {
                    state
                        .keywords
                        .clone()
                        .unwrap_or_else(|| state.phrases.join(", "))
                });
                ctx.components
                    .expander
                    .expand(&state.question, previous.as_deref())
                    .await
            }
        };

        let phrases = ctx
            .components
            .planner
            .plan(&state.question, keywords.as_deref());
        tracing::info!("Attempt {}: {} search phrase(s)", attempt, phrases.len());

        let note = ChatMessage::assistant(format!("Search phrases: {}", phrases.join(" | ")));
        Ok(NodeResult::next(
            StateUpdate::new()
                .phase(Phase::Retrieving { attempt })
                .keywords(keywords)
                .phrases(phrases)
                .message(note),
        ))
    }
}
