//! Data store seam and the `execute_query` capability.

use super::Capability;
use crate::core::{ExecutionResult, Row};
use crate::errors::{InvocationError, StoreError};
use crate::stages::{ExecuteQueryInput, StageName};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

/// A read-only tabular store the generated queries run against.
#[async_trait]
pub trait DataStore: Send + Sync {
    /// Renders the tables and typed columns as prompt text.
    async fn describe_schema(&self) -> Result<String, StoreError>;

    /// Runs one statement and returns its rows in column order.
    async fn query(&self, sql: &str) -> Result<Vec<Row>, StoreError>;
}

/// Runs the live query artifact against a [`DataStore`].
pub struct QueryExecutor {
    store: Arc<dyn DataStore>,
}

impl QueryExecutor {
    /// Creates an executor over `store`.
    #[must_use]
    pub fn new(store: Arc<dyn DataStore>) -> Self {
        Self { store }
    }

    /// Executes the query held by `input`.
    ///
    /// Never fails: a missing query or a store error is an
    /// [`ExecutionResult::Error`].
    pub async fn execute(&self, input: &ExecuteQueryInput) -> ExecutionResult {
        if !input.query.is_executable() {
            return ExecutionResult::error("No SQL query provided.");
        }

        match self.store.query(input.query.sql()).await {
            Ok(rows) => {
                debug!(rows = rows.len(), "Query executed");
                ExecutionResult::Rows(rows)
            }
            Err(e) => {
                warn!(error = %e, "Query failed");
                ExecutionResult::error(format!("Database query failed: {e}"))
            }
        }
    }
}

#[async_trait]
impl Capability for QueryExecutor {
    fn name(&self) -> &str {
        StageName::ExecuteQuery.as_str()
    }

    fn description(&self) -> &str {
        "Executes a SQL query and returns the rows as JSON"
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {"query": {"type": "object"}},
            "required": ["query"],
        })
    }

    async fn invoke(&self, input: serde_json::Value) -> Result<String, InvocationError> {
        let input: ExecuteQueryInput = serde_json::from_value(input)
            .map_err(|e| InvocationError::new(self.name(), format!("Invalid input: {e}")))?;

        let result = self.execute(&input).await;
        serde_json::to_string(&result).map_err(|e| InvocationError::new(self.name(), e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::QueryArtifact;
    use pretty_assertions::assert_eq;

    struct FakeStore;

    #[async_trait]
    impl DataStore for FakeStore {
        async fn describe_schema(&self) -> Result<String, StoreError> {
            Ok("Table: King".into())
        }

        async fn query(&self, sql: &str) -> Result<Vec<Row>, StoreError> {
            if sql.contains("Kng") {
                return Err(StoreError::Query("no such table: Kng".into()));
            }
            let mut row = Row::new();
            row.insert("COUNT(*)".into(), serde_json::json!(1234));
            Ok(vec![row])
        }
    }

    fn executor() -> QueryExecutor {
        QueryExecutor::new(Arc::new(FakeStore))
    }

    #[tokio::test]
    async fn test_rows_wire_form() {
        let out = executor()
            .invoke(serde_json::json!({"query": {"sql_query": "SELECT COUNT(*) FROM King"}}))
            .await
            .unwrap();
        assert_eq!(out, r#"{"data":[{"COUNT(*)":1234}]}"#);
    }

    #[tokio::test]
    async fn test_store_error_wire_form() {
        let out = executor()
            .invoke(serde_json::json!({"query": {"sql_query": "SELECT * FROM Kng"}}))
            .await
            .unwrap();
        assert_eq!(
            serde_json::from_str::<serde_json::Value>(&out).unwrap(),
            serde_json::json!({"error": "Database query failed: no such table: Kng", "data": []})
        );
    }

    #[tokio::test]
    async fn test_degraded_artifact_is_not_run() {
        let input = ExecuteQueryInput {
            query: QueryArtifact::degraded("repair failed"),
        };
        assert_eq!(
            executor().execute(&input).await,
            ExecutionResult::error("No SQL query provided.")
        );
    }

    #[tokio::test]
    async fn test_bad_input_is_invocation_error() {
        let err = executor()
            .invoke(serde_json::json!({"sql": "SELECT 1"}))
            .await
            .unwrap_err();
        assert_eq!(err.capability, "execute_query");
    }
}
