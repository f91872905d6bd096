//! The query artifact threaded through synthesis, validation and repair.

use serde::{Deserialize, Serialize};

/// A single query text, optionally marked with the error that produced it.
///
/// Exactly one artifact is live per loop iteration. A repair replaces it
/// wholesale; nothing beyond the immediately preceding artifact is kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryArtifact {
    /// The SQL text. Required on the wire; degraded artifacts carry it empty.
    pub sql_query: String,

    /// Set when the artifact is a placeholder for a repair that failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl QueryArtifact {
    /// Creates an artifact holding the given query.
    #[must_use]
    pub fn new(sql_query: impl Into<String>) -> Self {
        Self {
            sql_query: sql_query.into(),
            error: None,
        }
    }

    /// Creates a degraded artifact with no query text.
    ///
    /// Executing it fails, which consumes one attempt of the repair budget.
    #[must_use]
    pub fn degraded(error: impl Into<String>) -> Self {
        Self {
            sql_query: String::new(),
            error: Some(error.into()),
        }
    }

    /// Returns true if there is query text to run.
    #[must_use]
    pub fn is_executable(&self) -> bool {
        !self.sql_query.trim().is_empty()
    }

    /// Returns true if this artifact came from a failed repair.
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.error.is_some()
    }

    /// Returns the query text with surrounding whitespace removed.
    #[must_use]
    pub fn sql(&self) -> &str {
        self.sql_query.trim()
    }
}
