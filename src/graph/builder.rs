// Graph Builder
// Constructs the retrieval-grading-generation graph using petgraph

use super::node::GraphError;
use super::nodes::{
    CiteNode, ExpandNode, GradeNode, RankNode, RefuseNode, RetrieveNode, ReturnDocsNode,
    SynthesizeNode,
};
use super::runtime::{GraphBuilder, GraphRuntime};

/// Build the pipeline graph
///
/// One entry (`expand_keywords`), one conditional node (`grade`) and one
/// cycle back to expansion, bounded by the retry budget.
pub fn build_rag_graph(max_steps: usize) -> Result<GraphRuntime, GraphError> {
    GraphBuilder::new()
        .entry("expand_keywords")
        .max_steps(max_steps)
        // Retrieval loop
        .node(Box::new(ExpandNode::new()))
        .node(Box::new(RetrieveNode::new()))
        .node(Box::new(RankNode::new()))
        .node(Box::new(GradeNode::new()))
        // Answer path
        .node(Box::new(SynthesizeNode::new()))
        .node(Box::new(CiteNode::new()))
        // Terminals
        .node(Box::new(RefuseNode::new()))
        .node(Box::new(ReturnDocsNode::new()))
        .edge("expand_keywords", "retrieve")
        .edge("retrieve", "rank")
        .edge("rank", "grade")
        // Relevance gate
        .conditional_edge("grade", "expand_keywords", "retry")
        .conditional_edge("grade", "synthesize", "answer")
        .conditional_edge("grade", "refuse", "refuse")
        .conditional_edge("grade", "return_docs", "raw")
        .edge("synthesize", "cite")
        .build()
}
