//! Stage names, typed stage inputs and the stage invoker.
//!
//! A stage is one externally-invoked transformation step. The orchestrator
//! never talks to a session directly: it goes through [`StageInvoker`],
//! which turns every outcome into a typed payload or a [`StageFailure`].
//!
//! [`StageFailure`]: crate::errors::StageFailure

mod inputs;
mod invoker;
mod reply;

pub use inputs::{
    ExecuteQueryInput, ExtractEntitiesInput, RepairQueryInput, SynthesizeAnswerInput,
    SynthesizeQueryInput, ValidateQueryInput,
};
pub use invoker::StageInvoker;
pub use reply::StageReply;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The six stages of the pipeline, in the order they first run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageName {
    /// Extract table, columns and filters from the question.
    ExtractEntities,
    /// Write a query from the question and entities.
    SynthesizeQuery,
    /// Check and possibly revise the query against the schema.
    ValidateQuery,
    /// Run the query.
    ExecuteQuery,
    /// Fix a query given its execution error.
    RepairQuery,
    /// Turn the query result into a natural-language answer.
    SynthesizeAnswer,
}

impl StageName {
    /// All stages.
    pub const ALL: [Self; 6] = [
        Self::ExtractEntities,
        Self::SynthesizeQuery,
        Self::ValidateQuery,
        Self::ExecuteQuery,
        Self::RepairQuery,
        Self::SynthesizeAnswer,
    ];

    /// Returns the capability name used on the wire.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ExtractEntities => "extract_entities",
            Self::SynthesizeQuery => "synthesize_query",
            Self::ValidateQuery => "validate_query",
            Self::ExecuteQuery => "execute_query",
            Self::RepairQuery => "repair_query",
            Self::SynthesizeAnswer => "synthesize_answer",
        }
    }

    /// Returns true if a failure of this stage ends the pipeline at once.
    #[must_use]
    pub fn is_fail_fast(&self) -> bool {
        matches!(
            self,
            Self::ExtractEntities | Self::SynthesizeQuery | Self::ValidateQuery
        )
    }
}

impl fmt::Display for StageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StageName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|stage| stage.as_str() == s)
            .ok_or_else(|| format!("Unknown stage: {s}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_name_display() {
        assert_eq!(StageName::ExtractEntities.to_string(), "extract_entities");
        assert_eq!(StageName::SynthesizeAnswer.to_string(), "synthesize_answer");
    }

    #[test]
    fn test_stage_name_from_str() {
        for stage in StageName::ALL {
            assert_eq!(stage.as_str().parse::<StageName>().unwrap(), stage);
        }
        assert!("run_sqlite_query".parse::<StageName>().is_err());
    }

    #[test]
    fn test_fail_fast_stages() {
        assert!(StageName::ExtractEntities.is_fail_fast());
        assert!(StageName::ValidateQuery.is_fail_fast());
        assert!(!StageName::ExecuteQuery.is_fail_fast());
        assert!(!StageName::RepairQuery.is_fail_fast());
    }

    #[test]
    fn test_stage_name_serialize() {
        let json = serde_json::to_string(&StageName::RepairQuery).unwrap();
        assert_eq!(json, r#""repair_query""#);
    }
}
