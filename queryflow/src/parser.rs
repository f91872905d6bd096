//! Extraction of structured payloads from generative-stage text.
//!
//! Generative stages are told to emit a single top-level JSON object but may
//! wrap it in prose or markdown. The parser takes the span from the first
//! `{` to the last `}` and decodes it strictly.
//!
//! This is a heuristic, not a general parser. Text holding two top-level
//! objects yields one span covering both, which does not decode and is
//! reported as a [`ParseFailure`] carrying that span. Stage framing relies on
//! the single-object contract, so do not widen this without revisiting every
//! stage prompt.

use crate::errors::ParseFailure;
use serde::de::DeserializeOwned;

/// A decoded top-level JSON object.
pub type StructuredPayload = serde_json::Map<String, serde_json::Value>;

/// Returns the span from the first `{` to the last `}`, inclusive.
#[must_use]
pub fn candidate_span(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&raw[start..=end])
}

/// Parses the structured object embedded in `raw`.
pub fn parse(raw: &str) -> Result<StructuredPayload, ParseFailure> {
    let Some(candidate) = candidate_span(raw) else {
        return Err(ParseFailure::new("No valid JSON found in the response."));
    };

    serde_json::from_str::<StructuredPayload>(candidate).map_err(|e| {
        ParseFailure::new(format!("JSON decoding error: {e}")).with_candidate(candidate)
    })
}

/// Parses the embedded object and deserializes it into `T`.
pub fn parse_as<T: DeserializeOwned>(raw: &str) -> Result<T, ParseFailure> {
    let payload = parse(raw)?;
    decode_object(payload)
}

/// Deserializes an already-extracted object into `T`.
pub fn decode_object<T: DeserializeOwned>(payload: StructuredPayload) -> Result<T, ParseFailure> {
    let rendered = serde_json::Value::Object(payload);
    serde_json::from_value::<T>(rendered.clone()).map_err(|e| {
        ParseFailure::new(format!("Payload has unexpected shape: {e}"))
            .with_candidate(rendered.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::QueryArtifact;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_object_surrounded_by_prose() {
        let payload = parse(r#"foo {"a": 1} bar"#).unwrap();
        assert_eq!(serde_json::Value::Object(payload), serde_json::json!({"a": 1}));
    }

    #[test]
    fn test_markdown_fenced_object() {
        let raw = "Here is the query:\n```json\n{\"sql_query\": \"SELECT 1\"}\n```\nLet me know!";
        let query: QueryArtifact = parse_as(raw).unwrap();
        assert_eq!(query.sql_query, "SELECT 1");
    }

    #[test]
    fn test_no_brace_is_failure() {
        let err = parse("SELECT COUNT(*) FROM King").unwrap_err();
        assert_eq!(err.message, "No valid JSON found in the response.");
        assert!(err.candidate.is_none());
    }

    #[test]
    fn test_closing_before_opening_is_failure() {
        let err = parse("} nothing here {").unwrap_err();
        assert!(err.candidate.is_none());
    }

    #[test]
    fn test_two_objects_span_first_to_last_brace() {
        let raw = r#"{"a": 1} {"b": 2}"#;
        assert_eq!(candidate_span(raw), Some(raw));

        let err = parse(raw).unwrap_err();
        assert!(err.message.starts_with("JSON decoding error"));
        assert_eq!(err.candidate.as_deref(), Some(raw));
    }

    #[test]
    fn test_nested_object() {
        let payload = parse(r#"result: {"filters": {"City": "Seattle"}} done"#).unwrap();
        assert_eq!(payload["filters"]["City"], "Seattle");
    }

    #[test]
    fn test_malformed_object_is_failure() {
        let err = parse(r#"{"sql_query": "SELECT 1",}"#).unwrap_err();
        assert!(err.message.starts_with("JSON decoding error"));
    }

    #[test]
    fn test_wrong_shape_is_failure() {
        let err = parse_as::<QueryArtifact>(r#"{"sql_query": 42}"#).unwrap_err();
        assert!(err.message.contains("unexpected shape"));
    }
}
