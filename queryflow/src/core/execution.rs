//! Result of running a query against the data store.

use serde::{Deserialize, Serialize};

/// One result row: column name to value, in column order.
pub type Row = serde_json::Map<String, serde_json::Value>;

/// Outcome of one execute attempt.
///
/// On the wire this is `{"data": [...]}` for success and
/// `{"error": "...", "data": []}` for failure. Any payload without an
/// `error` key counts as success.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "ExecutionWire", into = "ExecutionWire")]
pub enum ExecutionResult {
    /// The query ran and produced these rows.
    Rows(Vec<Row>),
    /// The query failed with this message.
    Error(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ExecutionWire {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(default)]
    data: Vec<Row>,
}

impl From<ExecutionWire> for ExecutionResult {
    fn from(wire: ExecutionWire) -> Self {
        match wire.error {
            Some(error) => Self::Error(error),
            None => Self::Rows(wire.data),
        }
    }
}

impl From<ExecutionResult> for ExecutionWire {
    fn from(result: ExecutionResult) -> Self {
        match result {
            ExecutionResult::Rows(data) => Self { error: None, data },
            ExecutionResult::Error(error) => Self {
                error: Some(error),
                data: Vec::new(),
            },
        }
    }
}

impl ExecutionResult {
    /// Creates a failed result.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error(message.into())
    }

    /// Returns true if the query ran.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Rows(_))
    }

    /// Returns the error message, if any.
    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Error(message) => Some(message),
            Self::Rows(_) => None,
        }
    }

    /// Returns the rows, or an empty slice on failure.
    #[must_use]
    pub fn rows(&self) -> &[Row] {
        match self {
            Self::Rows(rows) => rows,
            Self::Error(_) => &[],
        }
    }

    /// Returns the number of rows.
    #[must_use]
    pub fn row_count(&self) -> usize {
        self.rows().len()
    }
}
