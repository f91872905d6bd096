//! Typed calls to the stage-execution environment.

use super::{
    ExecuteQueryInput, ExtractEntitiesInput, RepairQueryInput, StageName, StageReply,
    SynthesizeAnswerInput, SynthesizeQueryInput, ValidateQueryInput,
};
use crate::core::{EntitySet, ExecutionResult, QueryArtifact};
use crate::errors::{InvocationError, ParseFailure, StageFailure};
use crate::events::{self, EventSink};
use crate::parser;
use crate::session::Session;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Invokes stages over a session and decodes their replies.
///
/// There is no retry in this layer. A failed call is reported once and the
/// orchestrator decides what to do with it.
#[derive(Clone)]
pub struct StageInvoker {
    session: Arc<dyn Session>,
    sink: Arc<dyn EventSink>,
}

impl StageInvoker {
    /// Creates an invoker over a session, emitting into `sink`.
    #[must_use]
    pub fn new(session: Arc<dyn Session>, sink: Arc<dyn EventSink>) -> Self {
        Self { session, sink }
    }

    /// Returns the underlying session.
    #[must_use]
    pub fn session(&self) -> &Arc<dyn Session> {
        &self.session
    }

    /// Sends one raw call and returns the raw reply text.
    pub async fn invoke<I>(&self, stage: StageName, input: &I) -> Result<String, InvocationError>
    where
        I: Serialize + Sync,
    {
        let payload = serde_json::to_value(input).map_err(|e| {
            InvocationError::new(stage.as_str(), format!("Failed to serialize input: {e}"))
        })?;

        self.sink.try_emit(
            events::STAGE_INVOKED,
            Some(serde_json::json!({ "stage": stage.as_str() })),
        );
        debug!(stage = %stage, "Invoking stage");

        self.session.invoke_capability(stage.as_str(), payload).await
    }

    /// Extracts the entity set from a question.
    pub async fn extract_entities(&self, question: &str) -> Result<EntitySet, StageFailure> {
        let input = ExtractEntitiesInput {
            question: question.to_string(),
        };
        self.call(StageName::ExtractEntities, &input, decode_reply)
            .await
    }

    /// Writes a query for the question.
    pub async fn synthesize_query(
        &self,
        question: &str,
        entities: &EntitySet,
    ) -> Result<QueryArtifact, StageFailure> {
        let input = SynthesizeQueryInput {
            question: question.to_string(),
            entities: entities.clone(),
        };
        self.call(StageName::SynthesizeQuery, &input, decode_query)
            .await
    }

    /// Validates and possibly revises a query.
    pub async fn validate_query(
        &self,
        question: &str,
        entities: &EntitySet,
        query: &QueryArtifact,
    ) -> Result<QueryArtifact, StageFailure> {
        let input = ValidateQueryInput {
            question: question.to_string(),
            entities: entities.clone(),
            query: query.clone(),
        };
        self.call(StageName::ValidateQuery, &input, decode_query)
            .await
    }

    /// Runs a query.
    ///
    /// A reply carrying an `error` field is a successful call whose result is
    /// [`ExecutionResult::Error`], not a stage failure.
    pub async fn execute_query(
        &self,
        query: &QueryArtifact,
    ) -> Result<ExecutionResult, StageFailure> {
        let input = ExecuteQueryInput {
            query: query.clone(),
        };
        self.call(StageName::ExecuteQuery, &input, |raw| {
            parser::parse_as::<ExecutionResult>(raw).map_err(StageFailure::from)
        })
        .await
    }

    /// Asks for a corrected query given the error the last one produced.
    pub async fn repair_query(
        &self,
        query: &QueryArtifact,
        error_message: &str,
    ) -> Result<QueryArtifact, StageFailure> {
        let input = RepairQueryInput {
            query: query.clone(),
            error_message: error_message.to_string(),
        };
        self.call(StageName::RepairQuery, &input, decode_query)
            .await
    }

    /// Turns a result into the answer text.
    pub async fn synthesize_answer(
        &self,
        question: &str,
        result: &ExecutionResult,
    ) -> Result<String, StageFailure> {
        let input = SynthesizeAnswerInput {
            question: question.to_string(),
            result: result.clone(),
        };
        self.call(StageName::SynthesizeAnswer, &input, |raw| Ok(raw.to_string()))
            .await
    }

    async fn call<I, T, D>(&self, stage: StageName, input: &I, decode: D) -> Result<T, StageFailure>
    where
        I: Serialize + Sync,
        D: FnOnce(&str) -> Result<T, StageFailure>,
    {
        let started = Instant::now();
        let outcome = match self.invoke(stage, input).await {
            Ok(raw) => decode(&raw),
            Err(err) => Err(StageFailure::from(err)),
        };
        let duration_ms = started.elapsed().as_secs_f64() * 1000.0;

        match &outcome {
            Ok(_) => {
                debug!(stage = %stage, duration_ms, "Stage completed");
                self.sink.try_emit(
                    events::STAGE_COMPLETED,
                    Some(serde_json::json!({
                        "stage": stage.as_str(),
                        "duration_ms": duration_ms,
                    })),
                );
            }
            Err(failure) => {
                warn!(stage = %stage, kind = failure.kind(), error = %failure, "Stage failed");
                self.sink.try_emit(
                    events::STAGE_FAILED,
                    Some(serde_json::json!({
                        "stage": stage.as_str(),
                        "kind": failure.kind(),
                        "error": failure.to_string(),
                        "duration_ms": duration_ms,
                    })),
                );
            }
        }

        outcome
    }
}

impl std::fmt::Debug for StageInvoker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageInvoker").finish_non_exhaustive()
    }
}

fn decode_reply<T: DeserializeOwned>(raw: &str) -> Result<T, StageFailure> {
    StageReply::<T>::decode(raw)?.into_result()
}

/// Query replies must carry non-blank query text.
fn decode_query(raw: &str) -> Result<QueryArtifact, StageFailure> {
    let query: QueryArtifact = decode_reply(raw)?;
    if query.is_executable() {
        Ok(query)
    } else {
        Err(ParseFailure::new("Reply has an empty sql_query")
            .with_candidate(raw)
            .into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::CollectingEventSink;
    use crate::testing::ScriptedSession;

    fn invoker(session: ScriptedSession) -> (StageInvoker, Arc<ScriptedSession>, Arc<CollectingEventSink>) {
        let session = Arc::new(session);
        let sink = Arc::new(CollectingEventSink::new());
        (
            StageInvoker::new(session.clone(), sink.clone()),
            session,
            sink,
        )
    }

    #[tokio::test]
    async fn test_extract_entities_success() {
        let (invoker, session, sink) = invoker(ScriptedSession::new().with_reply(
            StageName::ExtractEntities,
            r#"{"table": "King", "columns_to_select": ["*"], "filters": {}}"#,
        ));

        let entities = invoker.extract_entities("How many?").await.unwrap();
        assert_eq!(entities.table, "King");
        assert_eq!(session.calls_to(StageName::ExtractEntities), 1);
        assert_eq!(
            session.inputs_to(StageName::ExtractEntities)[0]["question"],
            "How many?"
        );
        assert_eq!(
            sink.event_types(),
            vec![events::STAGE_INVOKED, events::STAGE_COMPLETED]
        );
    }

    #[tokio::test]
    async fn test_reported_error_is_failure() {
        let (invoker, _, sink) = invoker(
            ScriptedSession::new()
                .with_reply(StageName::SynthesizeQuery, r#"{"error": "LLM Error: overloaded"}"#),
        );

        let err = invoker
            .synthesize_query("q", &EntitySet::new("King"))
            .await
            .unwrap_err();
        assert_eq!(err, StageFailure::Reported("LLM Error: overloaded".into()));
        assert_eq!(sink.payloads_of(events::STAGE_FAILED)[0]["kind"], "reported");
    }

    #[tokio::test]
    async fn test_invocation_error_is_failure() {
        let (invoker, _, _) = invoker(
            ScriptedSession::new()
                .with_invocation_error(StageName::ValidateQuery, "server unreachable"),
        );

        let err = invoker
            .validate_query("q", &EntitySet::new("King"), &QueryArtifact::new("SELECT 1"))
            .await
            .unwrap_err();
        assert!(matches!(err, StageFailure::Invocation(_)));
    }

    #[tokio::test]
    async fn test_execute_error_payload_is_result() {
        let (invoker, _, _) = invoker(ScriptedSession::new().with_reply(
            StageName::ExecuteQuery,
            r#"{"error": "Database query failed: no such table: Kng", "data": []}"#,
        ));

        let result = invoker
            .execute_query(&QueryArtifact::new("SELECT * FROM Kng"))
            .await
            .unwrap();
        assert_eq!(
            result.error_message(),
            Some("Database query failed: no such table: Kng")
        );
    }

    #[tokio::test]
    async fn test_prose_reply_is_parse_failure() {
        let (invoker, _, _) = invoker(
            ScriptedSession::new()
                .with_reply(StageName::RepairQuery, "I could not fix this query, sorry."),
        );

        let err = invoker
            .repair_query(&QueryArtifact::new("SELECT"), "syntax error")
            .await
            .unwrap_err();
        assert!(matches!(err, StageFailure::Parse(_)));
    }

    #[tokio::test]
    async fn test_answer_is_raw_text() {
        let (invoker, _, _) = invoker(
            ScriptedSession::new()
                .with_reply(StageName::SynthesizeAnswer, "There are 1234 vehicles."),
        );

        let answer = invoker
            .synthesize_answer("q", &ExecutionResult::Rows(Vec::new()))
            .await
            .unwrap();
        assert_eq!(answer, "There are 1234 vehicles.");
    }
}
