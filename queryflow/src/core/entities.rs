//! Entities extracted from a natural-language question.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Structured extraction of table, columns and filters from a question.
///
/// Produced once by the extraction stage and consumed read-only afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySet {
    /// The table the question is about.
    pub table: String,

    /// Columns the user wants to see, in the order they were requested.
    #[serde(default)]
    pub columns_to_select: Vec<String>,

    /// Filter column mapped to its condition.
    #[serde(default)]
    pub filters: BTreeMap<String, serde_json::Value>,
}

impl EntitySet {
    /// Creates an entity set for a table with no columns or filters.
    #[must_use]
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns_to_select: Vec::new(),
            filters: BTreeMap::new(),
        }
    }

    /// Sets the requested columns.
    #[must_use]
    pub fn with_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns_to_select = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Adds a filter.
    #[must_use]
    pub fn with_filter(mut self, column: impl Into<String>, condition: serde_json::Value) -> Self {
        self.filters.insert(column.into(), condition);
        self
    }

    /// Returns true if every column was requested (`*` or nothing).
    #[must_use]
    pub fn selects_all(&self) -> bool {
        self.columns_to_select.is_empty() || self.columns_to_select.iter().any(|c| c == "*")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_extraction_payload() {
        let entities: EntitySet = serde_json::from_value(serde_json::json!({
            "table": "King",
            "columns_to_select": ["Make", "Model"],
            "filters": {"Electric Vehicle Type": "Battery Electric Vehicle (BEV)"}
        }))
        .unwrap();

        assert_eq!(entities.table, "King");
        assert_eq!(entities.columns_to_select, vec!["Make", "Model"]);
        assert_eq!(entities.filters.len(), 1);
        assert!(!entities.selects_all());
    }

    #[test]
    fn test_missing_optional_fields_default() {
        let entities: EntitySet =
            serde_json::from_value(serde_json::json!({"table": "King"})).unwrap();
        assert!(entities.columns_to_select.is_empty());
        assert!(entities.filters.is_empty());
        assert!(entities.selects_all());
    }

    #[test]
    fn test_missing_table_is_rejected() {
        let result: Result<EntitySet, _> =
            serde_json::from_value(serde_json::json!({"columns_to_select": ["*"]}));
        assert!(result.is_err());
    }

    #[test]
    fn test_builder() {
        let entities = EntitySet::new("King")
            .with_columns(["*"])
            .with_filter("City", serde_json::json!("Seattle"));

        assert!(entities.selects_all());
        assert_eq!(entities.filters["City"], "Seattle");
    }
}
