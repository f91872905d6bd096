//! Tagged success-or-failure replies from structured stages.

use crate::errors::{ParseFailure, StageFailure};
use crate::parser::{self, StructuredPayload};
use serde::de::DeserializeOwned;

/// The decoded reply of a structured stage.
#[derive(Debug, Clone, PartialEq)]
pub enum StageReply<T> {
    /// The stage produced its payload.
    Success(T),
    /// The stage ran and reported an error instead.
    Failed {
        /// The reported error.
        error: String,
    },
}

impl<T: DeserializeOwned> StageReply<T> {
    /// Decodes a reply from raw stage text.
    ///
    /// An object with a non-null `error` key is a [`StageReply::Failed`];
    /// anything else must deserialize as `T`.
    pub fn decode(raw: &str) -> Result<Self, ParseFailure> {
        let payload = parser::parse(raw)?;
        Self::from_object(payload)
    }

    /// Decodes a reply from an already-extracted object.
    pub fn from_object(mut payload: StructuredPayload) -> Result<Self, ParseFailure> {
        match payload.remove("error") {
            Some(serde_json::Value::Null) | None => {}
            Some(serde_json::Value::String(error)) => return Ok(Self::Failed { error }),
            Some(other) => {
                return Ok(Self::Failed {
                    error: other.to_string(),
                })
            }
        }
        parser::decode_object(payload).map(Self::Success)
    }
}

impl<T> StageReply<T> {
    /// Converts into a `Result`, mapping a reported error to a failure.
    pub fn into_result(self) -> Result<T, StageFailure> {
        match self {
            Self::Success(value) => Ok(value),
            Self::Failed { error } => Err(StageFailure::Reported(error)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{EntitySet, QueryArtifact};

    #[test]
    fn test_success() {
        let reply: StageReply<QueryArtifact> =
            StageReply::decode(r#"{"sql_query": "SELECT 1"}"#).unwrap();
        assert_eq!(reply, StageReply::Success(QueryArtifact::new("SELECT 1")));
    }

    #[test]
    fn test_reported_error() {
        let reply: StageReply<EntitySet> =
            StageReply::decode(r#"{"error": "LLM Error in extract_entities: overloaded"}"#)
                .unwrap();
        assert_eq!(
            reply.into_result().unwrap_err(),
            StageFailure::Reported("LLM Error in extract_entities: overloaded".into())
        );
    }

    #[test]
    fn test_null_error_is_ignored() {
        let reply: StageReply<QueryArtifact> =
            StageReply::decode(r#"{"sql_query": "SELECT 1", "error": null}"#).unwrap();
        assert!(matches!(reply, StageReply::Success(_)));
    }

    #[test]
    fn test_non_string_error() {
        let reply: StageReply<QueryArtifact> =
            StageReply::decode(r#"{"error": {"code": 5}}"#).unwrap();
        assert_eq!(
            reply,
            StageReply::Failed {
                error: r#"{"code":5}"#.into()
            }
        );
    }

    #[test]
    fn test_wrong_shape_is_parse_failure() {
        let result = StageReply::<EntitySet>::decode(r#"{"columns_to_select": ["*"]}"#);
        assert!(result.is_err());
    }
}
