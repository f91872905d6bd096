//! Canned stage replies for the electric-vehicle dataset.

use super::ScriptedSession;
use crate::stages::StageName;

/// The reference question.
pub const KING_QUESTION: &str = "How many vehicles are there in King county?";

/// Extraction reply for [`KING_QUESTION`].
pub const KING_ENTITIES: &str =
    r#"{"table": "King", "columns_to_select": ["*"], "filters": {}}"#;

/// Synthesis and validation reply for [`KING_QUESTION`].
pub const KING_QUERY: &str = r#"{"sql_query": "SELECT COUNT(*) FROM King"}"#;

/// Successful execution reply for [`KING_QUESTION`].
pub const KING_ROWS: &str = r#"{"data": [{"COUNT(*)": 1234}]}"#;

/// Answer reply for [`KING_QUESTION`].
pub const KING_ANSWER: &str = "There are 1234 electric vehicles registered in King county.";

/// Renders an execution error reply in wire form.
#[must_use]
pub fn execution_error(message: &str) -> String {
    serde_json::json!({ "error": message, "data": [] }).to_string()
}

/// Renders a query reply in wire form.
#[must_use]
pub fn query_reply(sql: &str) -> String {
    serde_json::json!({ "sql_query": sql }).to_string()
}

/// A session scripted up to (not including) the execute stage.
#[must_use]
pub fn king_county_prelude() -> ScriptedSession {
    ScriptedSession::new()
        .with_reply(StageName::ExtractEntities, KING_ENTITIES)
        .with_reply(StageName::SynthesizeQuery, KING_QUERY)
        .with_reply(StageName::ValidateQuery, KING_QUERY)
        .with_reply(StageName::SynthesizeAnswer, KING_ANSWER)
}

/// The happy path: execution succeeds on the first attempt.
#[must_use]
pub fn king_county_session() -> ScriptedSession {
    king_county_prelude().with_reply(StageName::ExecuteQuery, KING_ROWS)
}

/// Execution fails once on a bad column, repair fixes it.
#[must_use]
pub fn king_county_with_repair() -> ScriptedSession {
    king_county_prelude()
        .with_reply(
            StageName::ExecuteQuery,
            execution_error("no such column: Model_Year"),
        )
        .with_reply(StageName::ExecuteQuery, KING_ROWS)
        .with_reply(StageName::RepairQuery, KING_QUERY)
}

/// Execution fails on every attempt with the same error.
#[must_use]
pub fn king_county_always_failing(error: &str) -> ScriptedSession {
    king_county_prelude()
        .with_reply(StageName::ExecuteQuery, execution_error(error))
        .with_reply(StageName::RepairQuery, query_reply("SELECT COUNT(*) FROM Kng"))
}
