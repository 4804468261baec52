// Graph Nodes Module
// One node per pipeline stage

pub mod cite;
pub mod expand;
pub mod grade;
pub mod rank;
pub mod refuse;
pub mod retrieve;
pub mod return_docs;
pub mod synthesize;

pub use cite::CiteNode;
pub use expand::ExpandNode;
pub use grade::GradeNode;
pub use rank::RankNode;
pub use refuse::RefuseNode;
pub use retrieve::RetrieveNode;
pub use return_docs::ReturnDocsNode;
pub use synthesize::SynthesizeNode;
