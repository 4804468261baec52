// Graph Runtime - petgraph based
// Type-safe StateGraph execution engine

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use std::collections::HashMap;

use super::node::{GraphError, Node, NodeContext, NodeOutput};
use super::state::PipelineState;

/// Edge condition for graph routing
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EdgeCondition {
    /// Always follow this edge (default edge)
    Always,
    /// Follow this edge when the node returns this condition
    OnCondition(String),
}

impl EdgeCondition {
    pub fn always() -> Self {
        Self::Always
    }

    pub fn on(condition: impl Into<String>) -> Self {
        Self::OnCondition(condition.into())
    }

    pub fn matches(&self, condition: Option<&str>) -> bool {
        match (self, condition) {
            (EdgeCondition::Always, None) => true,
            (EdgeCondition::OnCondition(expected), Some(actual)) => expected == actual,
            _ => false,
        }
    }
}

/// petgraph-based StateGraph runtime
pub struct GraphRuntime {
    /// The underlying directed graph
    graph: DiGraph<Box<dyn Node>, EdgeCondition>,
    /// Map from node ID to NodeIndex for lookup
    node_indices: HashMap<String, NodeIndex>,
    /// Entry point node ID
    entry_node_id: String,
    /// Maximum execution steps (recursion limit)
    max_steps: usize,
}

impl GraphRuntime {
    pub fn new() -> Self {
        Self {
            graph: DiGraph::new(),
            node_indices: HashMap::new(),
            entry_node_id: String::new(),
            max_steps: 50,
        }
    }

    pub fn add_node(&mut self, node: Box<dyn Node>) -> NodeIndex {
        let id = node.id().to_string();
        let index = self.graph.add_node(node);
        self.node_indices.insert(id, index);
        index
    }

    /// Add an edge between two nodes (always follow)
    pub fn add_edge(&mut self, from: &str, to: &str) -> Result<(), GraphError> {
        self.add_conditional_edge(from, to, EdgeCondition::Always)
    }

    pub fn add_conditional_edge(
        &mut self,
        from: &str,
        to: &str,
        condition: EdgeCondition,
    ) -> Result<(), GraphError> {
        let from_idx = self
            .node_indices
            .get(from)
            .ok_or_else(|| GraphError::new(from, format!("Source node not found: {}", from)))?;
        let to_idx = self
            .node_indices
            .get(to)
            .ok_or_else(|| GraphError::new(to, format!("Target node not found: {}", to)))?;

        self.graph.add_edge(*from_idx, *to_idx, condition);
        Ok(())
    }

    pub fn get_node(&self, node_id: &str) -> Option<&dyn Node> {
        self.node_indices
            .get(node_id)
            .and_then(|idx| self.graph.node_weight(*idx))
            .map(|boxed| boxed.as_ref())
    }

    pub fn node_ids(&self) -> Vec<&str> {
        self.node_indices.keys().map(|s| s.as_str()).collect()
    }

    pub fn has_cycle(&self) -> bool {
        petgraph::algo::is_cyclic_directed(&self.graph)
    }

    /// Number of conditional (non-default) edges.
    pub fn conditional_edge_count(&self) -> usize {
        self.graph
            .edge_references()
            .filter(|e| matches!(e.weight(), EdgeCondition::OnCondition(_)))
            .count()
    }

    /// Execute the graph.
    ///
    /// Nodes run one at a time; each returned update is merged into `state`
    /// before the next node starts, so this loop is the only writer.
    pub async fn run(
        &self,
        state: &mut PipelineState,
        ctx: &NodeContext<'_>,
    ) -> Result<(), GraphError> {
        if self.entry_node_id.is_empty() {
            return Err(GraphError::new("runtime", "No entry node set"));
        }

        let mut current_idx = *self.node_indices.get(&self.entry_node_id).ok_or_else(|| {
            GraphError::new(
                "runtime",
                format!("Entry node not found: {}", self.entry_node_id),
            )
        })?;

        let mut trace: Vec<String> = Vec::new();
        let mut step = 0;

        loop {
            if step >= self.max_steps {
                return Err(GraphError::new(
                    "runtime",
                    format!("Maximum steps ({}) exceeded", self.max_steps),
                )
                .with_trace(trace));
            }

            let node = self
                .graph
                .node_weight(current_idx)
                .ok_or_else(|| GraphError::new("runtime", "Node not found in graph"))?;

            let node_id = node.id();
            tracing::debug!("Executing node: {} (step {})", node_id, step);

            let result = match node.execute(state, ctx).await {
                Ok(result) => result,
                Err(err) => return Err(err.with_trace(trace)),
            };
            trace.push(node_id.to_string());
            state.apply(result.update);

            match result.output {
                NodeOutput::Final => {
                    tracing::debug!("Graph execution complete at node: {}", node_id);
                    return Ok(());
                }
                NodeOutput::Error(msg) => {
                    return Err(GraphError::new(node_id, msg).with_trace(trace));
                }
                NodeOutput::Continue(explicit_next) => {
                    current_idx = self
                        .resolve_next_node(current_idx, None, explicit_next.as_deref())
                        .map_err(|e| e.with_trace(trace.clone()))?;
                }
                NodeOutput::Branch(condition) => {
                    current_idx = self
                        .resolve_next_node(current_idx, Some(&condition), None)
                        .map_err(|e| e.with_trace(trace.clone()))?;
                }
            }

            step += 1;
        }
    }

    fn resolve_next_node(
        &self,
        current_idx: NodeIndex,
        condition: Option<&str>,
        explicit: Option<&str>,
    ) -> Result<NodeIndex, GraphError> {
        let current_id = self
            .graph
            .node_weight(current_idx)
            .map(|n| n.id())
            .unwrap_or("unknown");

        if let Some(next_id) = explicit {
            return self.node_indices.get(next_id).copied().ok_or_else(|| {
                GraphError::new(current_id, format!("Explicit target node not found: {}", next_id))
            });
        }

        let edges: Vec<(NodeIndex, &EdgeCondition)> = self
            .graph
            .edges_directed(current_idx, Direction::Outgoing)
            .map(|edge| (edge.target(), edge.weight()))
            .collect();

        if edges.is_empty() {
            return Err(GraphError::new(
                current_id,
                format!("No outgoing edges from node: {}", current_id),
            ));
        }

        if let Some((target, _)) = edges.iter().find(|(_, weight)| weight.matches(condition)) {
            return Ok(*target);
        }

        // A branch on a condition nobody listens for is a wiring bug, not a
        // reason to take the default edge.
        Err(GraphError::new(
            current_id,
            format!(
                "No matching edge for condition: {:?}",
                condition.unwrap_or("(none)")
            ),
        ))
    }
}

impl Default for GraphRuntime {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for constructing graphs fluently
pub struct GraphBuilder {
    runtime: GraphRuntime,
    pending_edges: Vec<(String, String, EdgeCondition)>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self {
            runtime: GraphRuntime::new(),
            pending_edges: Vec::new(),
        }
    }

    pub fn entry(mut self, node_id: impl Into<String>) -> Self {
        self.runtime.entry_node_id = node_id.into();
        self
    }

    pub fn max_steps(mut self, max_steps: usize) -> Self {
        self.runtime.max_steps = max_steps;
        self
    }

    pub fn node(mut self, node: Box<dyn Node>) -> Self {
        self.runtime.add_node(node);
        self
    }

    pub fn edge(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.pending_edges
            .push((from.into(), to.into(), EdgeCondition::Always));
        self
    }

    pub fn conditional_edge(
        mut self,
        from: impl Into<String>,
        to: impl Into<String>,
        condition: impl Into<String>,
    ) -> Self {
        self.pending_edges
            .push((from.into(), to.into(), EdgeCondition::on(condition)));
        self
    }

    pub fn build(mut self) -> Result<GraphRuntime, GraphError> {
        for (from, to, condition) in self.pending_edges {
            self.runtime.add_conditional_edge(&from, &to, condition)?;
        }
        Ok(self.runtime)
    }
}

impl Default for GraphBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::settings::PipelineSettings;
    use crate::graph::node::NodeResult;
    use crate::graph::state::StateUpdate;
    use crate::llm::ChatMessage;
    use crate::pipeline::PipelineComponents;
    use crate::core::config::RagSettings;
    use crate::test_support::{CannedFullText, CannedVector, ScriptedLlm};
    use async_trait::async_trait;
    use std::sync::Arc;

    /// Appends its id to history and routes by a fixed output.
    struct Echo {
        id: &'static str,
        output: NodeOutput,
    }

    #[async_trait]
    impl Node for Echo {
        fn id(&self) -> &'static str {
            self.id
        }

        async fn execute(
            &self,
            _state: &PipelineState,
            _ctx: &NodeContext<'_>,
        ) -> Result<NodeResult, GraphError> {
            Ok(NodeResult {
                update: StateUpdate::new().message(ChatMessage::assistant(self.id)),
                output: self.output.clone(),
            })
        }
    }

    fn echo(id: &'static str, output: NodeOutput) -> Box<dyn Node> {
        Box::new(Echo { id, output })
    }

    fn components() -> PipelineComponents {
        PipelineComponents::new(
            &RagSettings::default(),
            Arc::new(ScriptedLlm::replying("")),
            Arc::new(CannedVector::empty()),
            Arc::new(CannedFullText::empty()),
        )
    }

    fn visited(state: &PipelineState) -> Vec<&str> {
        state.history.iter().skip(1).map(|m| m.content.as_str()).collect()
    }

    #[test]
    fn test_edge_condition_matching() {
        assert!(EdgeCondition::Always.matches(None));
        assert!(!EdgeCondition::Always.matches(Some("chat")));

        assert!(EdgeCondition::on("chat").matches(Some("chat")));
        assert!(!EdgeCondition::on("chat").matches(Some("search")));
        assert!(!EdgeCondition::on("chat").matches(None));
    }

    #[tokio::test]
    async fn run_follows_branches_and_merges_updates() {
        let graph = GraphBuilder::new()
            .entry("a")
            .node(echo("a", NodeOutput::Continue(None)))
            .node(echo("b", NodeOutput::Branch("right".to_string())))
            .node(echo("left", NodeOutput::Final))
            .node(echo("right", NodeOutput::Final))
            .edge("a", "b")
            .conditional_edge("b", "left", "left")
            .conditional_edge("b", "right", "right")
            .build()
            .unwrap();

        let components = components();
        let settings = PipelineSettings::default();
        let ctx = NodeContext { components: &components, settings: &settings };
        let mut state = PipelineState::new("r".to_string(), "q".to_string());

        graph.run(&mut state, &ctx).await.unwrap();

        assert_eq!(visited(&state), vec!["a", "b", "right"]);
        assert_eq!(graph.conditional_edge_count(), 2);
    }

    #[tokio::test]
    async fn unmatched_branch_is_an_error_with_trace() {
        let graph = GraphBuilder::new()
            .entry("a")
            .node(echo("a", NodeOutput::Branch("nowhere".to_string())))
            .node(echo("b", NodeOutput::Final))
            .conditional_edge("a", "b", "somewhere")
            .build()
            .unwrap();

        let components = components();
        let settings = PipelineSettings::default();
        let ctx = NodeContext { components: &components, settings: &settings };
        let mut state = PipelineState::new("r".to_string(), "q".to_string());

        let err = graph.run(&mut state, &ctx).await.unwrap_err();
        assert_eq!(err.node_id, "a");
        assert_eq!(err.execution_trace, vec!["a".to_string()]);
    }

    #[tokio::test]
    async fn step_limit_stops_runaway_loops() {
        let graph = GraphBuilder::new()
            .entry("a")
            .max_steps(5)
            .node(echo("a", NodeOutput::Continue(None)))
            .node(echo("b", NodeOutput::Continue(None)))
            .edge("a", "b")
            .edge("b", "a")
            .build()
            .unwrap();
        assert!(graph.has_cycle());

        let components = components();
        let settings = PipelineSettings::default();
        let ctx = NodeContext { components: &components, settings: &settings };
        let mut state = PipelineState::new("r".to_string(), "q".to_string());

        let err = graph.run(&mut state, &ctx).await.unwrap_err();
        assert!(err.message.contains("Maximum steps (5)"));
        assert_eq!(err.execution_trace.len(), 5);
    }
}
