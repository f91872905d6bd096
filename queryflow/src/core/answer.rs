//! Terminal artifact of a pipeline run.

use crate::errors::PipelineFailure;
use std::fmt;

/// Either a natural-language answer or a terminal failure.
#[derive(Debug, Clone, PartialEq)]
pub enum FinalAnswer {
    /// The synthesized answer text.
    Answer(String),
    /// The pipeline ended without an answer.
    Failure(PipelineFailure),
}

impl FinalAnswer {
    /// Returns true if an answer was produced.
    #[must_use]
    pub fn is_answer(&self) -> bool {
        matches!(self, Self::Answer(_))
    }

    /// Returns the failure, if any.
    #[must_use]
    pub fn failure(&self) -> Option<&PipelineFailure> {
        match self {
            Self::Failure(failure) => Some(failure),
            Self::Answer(_) => None,
        }
    }

    /// Consumes the answer and returns the user-facing text.
    #[must_use]
    pub fn into_text(self) -> String {
        match self {
            Self::Answer(text) => text,
            Self::Failure(failure) => failure.to_string(),
        }
    }
}

impl fmt::Display for FinalAnswer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Answer(text) => write!(f, "{text}"),
            Self::Failure(failure) => write!(f, "{failure}"),
        }
    }
}

impl From<PipelineFailure> for FinalAnswer {
    fn from(failure: PipelineFailure) -> Self {
        Self::Failure(failure)
    }
}
