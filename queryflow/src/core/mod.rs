//! Core domain model types for queryflow.
//!
//! All of these are transient and live for one question:
//! - Entity set extracted from the question
//! - The mutable query artifact
//! - Execution results and the final answer
//! - Pipeline states

mod answer;
mod entities;
mod execution;
mod query;
mod status;

pub use answer::FinalAnswer;
pub use entities::EntitySet;
pub use execution::{ExecutionResult, Row};
pub use query::QueryArtifact;
pub use status::PipelineState;
