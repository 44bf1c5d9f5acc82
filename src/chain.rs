//! Pipeline documents, references and the validated step graph.

pub mod definition;
pub mod document;
pub mod parser;
pub mod reference;

pub use definition::{MergeStrategy, ParallelGroup, PipelineDefinition, PipelineSettings, SingleStep, Step};
pub use parser::ChainParser;
pub use reference::Reference;
