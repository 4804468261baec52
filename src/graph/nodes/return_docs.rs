// Return Docs Node
// Terminal: ranked passages verbatim instead of an answer

use async_trait::async_trait;

use crate::graph::node::{GraphError, Node, NodeContext, NodeResult};
use crate::graph::state::{PipelineOutcome, PipelineState, StateUpdate};
use crate::llm::ChatMessage;
use crate::search::SearchResult;

pub struct ReturnDocsNode;

impl ReturnDocsNode {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ReturnDocsNode {
    fn default() -> Self {
        Self::new()
    }
}

/// `Source : {name}` then the passage, vector results first.
pub fn format_documents(vector: &[SearchResult], fulltext: &[SearchResult]) -> String {
    vector
        .iter()
        .chain(fulltext)
        .map(|r| format!("Source : {}\n{}", r.source_name, r.text.trim()))
        .collect::<Vec<_>>()
        .join("\n")
}

#[async_trait]
impl Node for ReturnDocsNode {
    fn id(&self) -> &'static str {
        "return_docs"
    }

    fn name(&self) -> &'static str {
        "Raw Documents"
    }

    async fn execute(
        &self,
        state: &PipelineState,
        _ctx: &NodeContext<'_>,
    ) -> Result<NodeResult, GraphError> {
        let text = format_documents(&state.ranked.vector, &state.ranked.fulltext);
        Ok(NodeResult::finish(
            StateUpdate::new()
                .message(ChatMessage::assistant(text.clone()))
                .outcome(PipelineOutcome::RawDocuments { text }),
        ))
    }
}
