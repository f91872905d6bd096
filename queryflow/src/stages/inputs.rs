//! Typed inputs for each stage.
//!
//! These are serialized as the argument object of a capability call and
//! deserialized again on the serving side.

use crate::core::{EntitySet, ExecutionResult, QueryArtifact};
use serde::{Deserialize, Serialize};

/// Input of `extract_entities`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractEntitiesInput {
    /// The user's question.
    pub question: String,
}

/// Input of `synthesize_query`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynthesizeQueryInput {
    /// The user's question.
    pub question: String,
    /// Entities extracted from the question.
    pub entities: EntitySet,
}

/// Input of `validate_query`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidateQueryInput {
    /// The user's question.
    pub question: String,
    /// Entities extracted from the question.
    pub entities: EntitySet,
    /// The query to validate.
    pub query: QueryArtifact,
}

/// Input of `execute_query`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecuteQueryInput {
    /// The query to run.
    pub query: QueryArtifact,
}

/// Input of `repair_query`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepairQueryInput {
    /// The query that failed.
    pub query: QueryArtifact,
    /// The error it failed with.
    pub error_message: String,
}

/// Input of `synthesize_answer`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynthesizeAnswerInput {
    /// The user's question.
    pub question: String,
    /// The successful execution result.
    pub result: ExecutionResult,
}
