// Node trait and types
// Base abstraction for graph nodes

use async_trait::async_trait;

use crate::core::config::settings::PipelineSettings;
use crate::core::errors::ApiError;
use crate::pipeline::PipelineComponents;

use super::state::{PipelineState, StateUpdate};

/// Context passed to nodes during execution
pub struct NodeContext<'a> {
    /// Pipeline components (expander, retriever, gate, ...)
    pub components: &'a PipelineComponents,
    /// Retry limit and fixed phrases
    pub settings: &'a PipelineSettings,
}

/// Routing decision from a node execution
#[derive(Debug, Clone)]
pub enum NodeOutput {
    /// Continue to the specified next node (None = use default edge)
    Continue(Option<String>),
    /// Branch to one of the specified nodes based on condition
    Branch(String),
    /// Graph execution complete
    Final,
    /// Error occurred
    Error(String),
}

/// What a node hands back to the runtime: the state changes and where to go next.
#[derive(Debug, Clone)]
pub struct NodeResult {
    pub update: StateUpdate,
    pub output: NodeOutput,
}

impl NodeResult {
    pub fn next(update: StateUpdate) -> Self {
        Self {
            update,
            output: NodeOutput::Continue(None),
        }
    }

    pub fn branch(update: StateUpdate, condition: impl Into<String>) -> Self {
        Self {
            update,
            output: NodeOutput::Branch(condition.into()),
        }
    }

    pub fn finish(update: StateUpdate) -> Self {
        Self {
            update,
            output: NodeOutput::Final,
        }
    }
}

/// Graph execution error
///
/// Includes an optional `execution_trace` to record the sequence of node IDs
/// visited before the error occurred.
#[derive(Debug, Clone)]
pub struct GraphError {
    pub node_id: String,
    pub message: String,
    /// Ordered list of node IDs executed before this error, most-recent last.
    pub execution_trace: Vec<String>,
}

impl GraphError {
    pub fn new(node_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            message: message.into(),
            execution_trace: Vec::new(),
        }
    }

    pub fn with_trace(mut self, trace: Vec<String>) -> Self {
        self.execution_trace = trace;
        self
    }
}

impl From<GraphError> for ApiError {
    fn from(err: GraphError) -> Self {
        ApiError::internal(err)
    }
}

impl std::fmt::Display for GraphError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.execution_trace.is_empty() {
            write!(f, "GraphError in {}: {}", self.node_id, self.message)
        } else {
            write!(
                f,
                "GraphError in {} (trace: {}): {}",
                self.node_id,
                self.execution_trace.join(" -> "),
                self.message
            )
        }
    }
}

impl std::error::Error for GraphError {}

/// Node trait - all graph nodes implement this
#[async_trait]
pub trait Node: Send + Sync {
    /// Unique identifier for this node
    fn id(&self) -> &'static str;

    /// Human-readable name for display
    fn name(&self) -> &'static str {
        self.id()
    }

    /// Execute the node logic against a read-only view of the state
    async fn execute(
        &self,
        state: &PipelineState,
        ctx: &NodeContext<'_>,
    ) -> Result<NodeResult, GraphError>;
}
