//! SQLite-backed data store.

use super::DataStore;
use crate::core::Row;
use crate::errors::StoreError;
use async_trait::async_trait;
use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

/// A SQLite file opened read-only for every call.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    path: PathBuf,
}

impl SqliteStore {
    /// Creates a store over the database file at `path`.
    #[must_use]
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Returns the database path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open(path: &Path) -> Result<Connection, StoreError> {
        Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| StoreError::Open {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
    }

    async fn with_connection<T, F>(&self, work: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || {
            let conn = Self::open(&path)?;
            work(&conn)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }
}

fn query_error(e: rusqlite::Error) -> StoreError {
    StoreError::Query(e.to_string())
}

fn to_json(value: ValueRef<'_>) -> serde_json::Value {
    match value {
        ValueRef::Null => serde_json::Value::Null,
        ValueRef::Integer(i) => serde_json::json!(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map_or(serde_json::Value::Null, serde_json::Value::Number),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            serde_json::Value::String(String::from_utf8_lossy(bytes).into_owned())
        }
    }
}

fn run_query(conn: &Connection, sql: &str) -> Result<Vec<Row>, StoreError> {
    let mut stmt = conn.prepare(sql).map_err(query_error)?;
    let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();

    let mut rows = stmt.query([]).map_err(query_error)?;
    let mut out = Vec::new();
    while let Some(row) = rows.next().map_err(query_error)? {
        let mut record = Row::new();
        for (idx, column) in columns.iter().enumerate() {
            let value = row.get_ref(idx).map_err(query_error)?;
            record.insert(column.clone(), to_json(value));
        }
        out.push(record);
    }
    Ok(out)
}

fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn table_names(conn: &Connection) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT name FROM sqlite_master WHERE type='table'")?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(names)
}

fn table_columns(conn: &Connection, table: &str) -> rusqlite::Result<Vec<(String, String)>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", quote_identifier(table)))?;
    let columns = stmt
        .query_map([], |row| Ok((row.get(1)?, row.get(2)?)))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(columns)
}

fn describe(conn: &Connection) -> Result<String, StoreError> {
    let tables = table_names(conn).map_err(query_error)?;

    let mut out = format!(
        "Database schema contains the following tables: {}. Each table contains various columns with specific data types.",
        tables.join(", ").replace(' ', "")
    );

    for table in &tables {
        let _ = write!(out, "\n\nTable: {table}\nColumns:\n");
        for (name, kind) in table_columns(conn, table).map_err(query_error)? {
            let _ = writeln!(out, "{name} ({kind})");
        }
    }
    Ok(out)
}

#[async_trait]
impl DataStore for SqliteStore {
    async fn describe_schema(&self) -> Result<String, StoreError> {
        self.with_connection(describe).await
    }

    async fn query(&self, sql: &str) -> Result<Vec<Row>, StoreError> {
        let sql = sql.to_string();
        self.with_connection(move |conn| run_query(conn, &sql)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn fixture() -> (tempfile::TempDir, SqliteStore) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ev.db");
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch(
            "CREATE TABLE King (Make TEXT, Model TEXT, \"Model Year\" INTEGER, Range REAL);
             INSERT INTO King VALUES ('TESLA', 'MODEL 3', 2022, 272.5);
             INSERT INTO King VALUES ('NISSAN', 'LEAF', 2019, NULL);
             CREATE TABLE Pierce (Make TEXT);",
        )
        .unwrap();
        drop(conn);
        (dir, SqliteStore::new(path))
    }

    #[tokio::test]
    async fn test_query_preserves_column_order() {
        let (_dir, store) = fixture();
        let rows = store
            .query("SELECT Range, Make, \"Model Year\" FROM King ORDER BY Make")
            .await
            .unwrap();

        assert_eq!(rows.len(), 2);
        let keys: Vec<&String> = rows[0].keys().collect();
        assert_eq!(keys, vec!["Range", "Make", "Model Year"]);
        assert_eq!(rows[0]["Make"], "NISSAN");
        assert_eq!(rows[0]["Range"], serde_json::Value::Null);
        assert_eq!(rows[1]["Range"], 272.5);
        assert_eq!(rows[1]["Model Year"], 2022);
    }

    #[tokio::test]
    async fn test_aggregate() {
        let (_dir, store) = fixture();
        let rows = store.query("SELECT COUNT(*) FROM King").await.unwrap();
        assert_eq!(rows[0]["COUNT(*)"], 2);
    }

    #[tokio::test]
    async fn test_bad_sql_is_query_error() {
        let (_dir, store) = fixture();
        let err = store.query("SELECT * FROM Kng").await.unwrap_err();
        assert!(matches!(err, StoreError::Query(_)));
        assert!(err.to_string().contains("no such table"));
    }

    #[tokio::test]
    async fn test_writes_are_rejected() {
        let (_dir, store) = fixture();
        assert!(store.query("DELETE FROM King").await.is_err());
        let rows = store.query("SELECT COUNT(*) AS n FROM King").await.unwrap();
        assert_eq!(rows[0]["n"], 2);
    }

    #[tokio::test]
    async fn test_missing_file_is_open_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::new(dir.path().join("missing.db"));
        let err = store.query("SELECT 1").await.unwrap_err();
        assert!(matches!(err, StoreError::Open { .. }));
    }

    #[tokio::test]
    async fn test_describe_schema() {
        let (_dir, store) = fixture();
        let schema = store.describe_schema().await.unwrap();

        assert!(schema.starts_with(
            "Database schema contains the following tables: King,Pierce. Each table"
        ));
        assert!(schema.contains("\n\nTable: King\nColumns:\nMake (TEXT)\nModel (TEXT)\nModel Year (INTEGER)\nRange (REAL)\n"));
        assert!(schema.contains("\n\nTable: Pierce\nColumns:\nMake (TEXT)\n"));
    }
}
