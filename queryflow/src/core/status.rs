//! Pipeline state machine states.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A state of the question-answering pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PipelineState {
    /// Nothing has run yet.
    Init,
    /// The extraction stage produced an entity set.
    EntitiesExtracted,
    /// The synthesis stage produced a query.
    QuerySynthesized,
    /// The validation stage accepted or revised the query.
    QueryValidated,
    /// Inside the repair loop, on the given 1-based attempt.
    Executing {
        /// The current attempt number.
        attempt: usize,
    },
    /// An answer was produced.
    Succeeded,
    /// The pipeline ended without an answer.
    Failed,
}

impl Default for PipelineState {
    fn default() -> Self {
        Self::Init
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Init => write!(f, "init"),
            Self::EntitiesExtracted => write!(f, "entities_extracted"),
            Self::QuerySynthesized => write!(f, "query_synthesized"),
            Self::QueryValidated => write!(f, "query_validated"),
            Self::Executing { attempt } => write!(f, "executing({attempt})"),
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl PipelineState {
    /// Returns true if the state represents a terminal state.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    /// Returns true if the state indicates success.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded)
    }

    /// Returns the attempt number if inside the repair loop.
    #[must_use]
    pub fn attempt(&self) -> Option<usize> {
        match self {
            Self::Executing { attempt } => Some(*attempt),
            _ => None,
        }
    }
}
