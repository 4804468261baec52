pub mod core;
pub mod graph;
pub mod llm;
pub mod pipeline;
pub mod rag;
pub mod search;
pub mod server;
pub mod state;

#[cfg(test)]
mod test_support;

pub use pipeline::{Pipeline, PipelineOutcome, PipelineRequest};
