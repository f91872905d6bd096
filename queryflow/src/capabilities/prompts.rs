//! Fixed prompt templates for the generative stages.

use crate::core::{EntitySet, ExecutionResult, QueryArtifact};

fn pretty<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_default()
}

pub(super) fn extract_entities(question: &str, dictionary: &str) -> String {
    format!(
        r#"You are a data analyst. Your job is to extract key entities from a user's question.
Use the provided data dictionary to understand the columns.

Data Dictionary:
{dictionary}

User Question: "{question}"

Extract the necessary components to answer the question. Your output MUST be a single JSON object with keys: "table", "columns_to_select", and "filters".
- "table": The table name, which is always a county name (e.g., "King").
- "columns_to_select": A list of columns the user wants to see.
- "filters": A dictionary of filters to apply, where the key is the column name and value is the condition.
"#
    )
}

pub(super) fn synthesize_query(question: &str, entities: &EntitySet) -> String {
    format!(
        r#"You are an expert SQLite developer. Create a single, valid SQLite query to answer the user's question.
Understand the user's intent and the context provided by the extracted entities.
The query may be complex, using window functions (like ROW_NUMBER(), PARTITION BY), subqueries, or other advanced features.

User's Question: "{question}"
Extracted Entities: {entities}

Your output MUST be the raw SQLite query text, and nothing else. Do not wrap it in JSON or markdown.
"#,
        entities = pretty(entities),
    )
}

pub(super) fn validate_query(
    question: &str,
    entities: &EntitySet,
    query: &QueryArtifact,
    schema: &str,
) -> String {
    format!(
        r#"You are a SQL validator and debugger. Your task is to check if the provided SQL query correctly answers the user's question and is syntactically correct for SQLite.
Strictly follow the schema information provided to ensure no hallucinations or incorrect names.

Provided Information:
1. User's Original Question: "{question}"
2. Extracted Entities (for context): {entities}
3. Generated SQL Query to Validate: {query}
4. Database Schema Information: {schema}

Your Tasks:
1. Check for syntax errors.
2. Check for "hallucinated" or incorrect column and table names by comparing against the schema.
3. Ensure the query logic accurately reflects the user's question (e.g., if they ask for "top 3", there should be an ORDER BY and LIMIT 3).

Your output MUST be a single JSON object with one key: "sql_query", containing the final, validated, and potentially corrected query.
"#,
        entities = pretty(entities),
        query = serde_json::to_string(query).unwrap_or_default(),
    )
}

pub(super) fn repair_query(failed_query: &str, error_message: &str) -> String {
    format!(
        r#"You are a highly skilled SQLite expert debugging a query.

The following SQL query failed to execute:
```sql
{failed_query}
```

It produced this specific error message:
`{error_message}`

Task:
1. Carefully analyze the query and the error message.
2. Provide a corrected SQLite query that resolves the identified error.

Your output MUST be a single JSON object with one key: "sql_query", containing only the corrected query.
"#
    )
}

pub(super) fn synthesize_answer(question: &str, result: &ExecutionResult) -> String {
    format!(
        r#"You are a helpful assistant. Answer the user's question based on the provided data.
If the data contains an error, explain it simply. If the data is empty, say so.

Original Question: "{question}"
Data from Database: {data}
"#,
        data = pretty(result),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extraction_prompt_embeds_question_and_dictionary() {
        let prompt = extract_entities("How many Teslas?", "- Column 'Make'");
        assert!(prompt.contains(r#"User Question: "How many Teslas?""#));
        assert!(prompt.contains("- Column 'Make'"));
    }

    #[test]
    fn test_repair_prompt_embeds_error() {
        let prompt = repair_query("SELECT Model_Year FROM King", "no such column: Model_Year");
        assert!(prompt.contains("SELECT Model_Year FROM King"));
        assert!(prompt.contains("`no such column: Model_Year`"));
    }

    #[test]
    fn test_answer_prompt_renders_rows() {
        let result: ExecutionResult =
            serde_json::from_str(r#"{"data": [{"COUNT(*)": 1234}]}"#).unwrap();
        let prompt = synthesize_answer("How many?", &result);
        assert!(prompt.contains("\"COUNT(*)\": 1234"));
    }
}
