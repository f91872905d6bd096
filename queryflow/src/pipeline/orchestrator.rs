//! The question-answering state machine and its repair loop.

use super::{PipelineConfig, PipelineRun};
use crate::core::{ExecutionResult, FinalAnswer, PipelineState, QueryArtifact};
use crate::errors::{PipelineFailure, SessionError, StageFailure};
use crate::events::{self, EventSink, NoOpEventSink};
use crate::session::Session;
use crate::stages::{StageInvoker, StageName};
use chrono::Utc;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

/// States and counters accumulated while a run is in flight.
///
/// Lives outside the pipeline future so it survives a panic or timeout.
struct RunTrace {
    run_id: Uuid,
    sink: Arc<dyn EventSink>,
    states: Vec<PipelineState>,
    execute_attempts: usize,
    repair_attempts: usize,
}

impl RunTrace {
    fn new(run_id: Uuid, sink: Arc<dyn EventSink>) -> Self {
        Self {
            run_id,
            sink,
            states: vec![PipelineState::Init],
            execute_attempts: 0,
            repair_attempts: 0,
        }
    }

    fn enter(&mut self, state: PipelineState) {
        let from = self.states.last().copied().unwrap_or_default();
        self.states.push(state);

        info!(from = %from, to = %state, "Pipeline state");
        self.sink.try_emit(
            events::PIPELINE_STATE,
            Some(serde_json::json!({
                "run_id": self.run_id.to_string(),
                "from": from.to_string(),
                "to": state.to_string(),
                "attempt": state.attempt(),
            })),
        );
    }
}

fn stage_failed(stage: StageName) -> impl FnOnce(StageFailure) -> PipelineFailure {
    move |reason| PipelineFailure::StageFailed { stage, reason }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

/// Drives a question through extraction, synthesis, validation, the
/// execute/repair loop and answer synthesis.
///
/// Holds one session for its lifetime. Questions on the same orchestrator
/// are answered one stage call at a time.
pub struct PipelineOrchestrator {
    invoker: StageInvoker,
    sink: Arc<dyn EventSink>,
    config: PipelineConfig,
}

impl PipelineOrchestrator {
    /// Creates an orchestrator over `session` with default configuration.
    #[must_use]
    pub fn new(session: Arc<dyn Session>) -> Self {
        let sink: Arc<dyn EventSink> = Arc::new(NoOpEventSink);
        Self {
            invoker: StageInvoker::new(session, Arc::clone(&sink)),
            sink,
            config: PipelineConfig::default(),
        }
    }

    /// Replaces the configuration.
    #[must_use]
    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// Routes events to `sink`.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.invoker = StageInvoker::new(Arc::clone(self.invoker.session()), Arc::clone(&sink));
        self.sink = sink;
        self
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Returns the session.
    #[must_use]
    pub fn session(&self) -> &Arc<dyn Session> {
        self.invoker.session()
    }

    /// Checks that the session offers every pipeline stage.
    pub async fn verify_capabilities(&self) -> Result<(), SessionError> {
        let offered = self.session().list_capabilities().await?;
        let missing: Vec<&str> = StageName::ALL
            .iter()
            .map(StageName::as_str)
            .filter(|name| !offered.iter().any(|o| o == name))
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(SessionError::Protocol(format!(
                "Stage server is missing capabilities: {}",
                missing.join(", ")
            )))
        }
    }

    /// Answers a question. Always returns text, never panics or errors.
    pub async fn ask(&self, question: &str) -> String {
        self.run(question).await.into_text()
    }

    /// Answers a question and returns the full run record.
    pub async fn run(&self, question: &str) -> PipelineRun {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let span = info_span!("pipeline", run_id = %run_id);

        async {
            info!(question, max_attempts = self.config.max_attempts, "Pipeline started");
            self.sink.try_emit(
                events::PIPELINE_STARTED,
                Some(serde_json::json!({
                    "run_id": run_id.to_string(),
                    "question": question,
                    "max_attempts": self.config.max_attempts,
                })),
            );

            let mut trace = RunTrace::new(run_id, Arc::clone(&self.sink));
            let answer = self.drive_guarded(question, &mut trace).await;

            let terminal = if answer.is_answer() {
                PipelineState::Succeeded
            } else {
                PipelineState::Failed
            };
            trace.enter(terminal);

            let run = PipelineRun {
                run_id,
                question: question.to_string(),
                answer,
                states: trace.states,
                execute_attempts: trace.execute_attempts,
                repair_attempts: trace.repair_attempts,
                started_at,
                ended_at: Utc::now(),
            };
            self.finish(&run).await;
            run
        }
        .instrument(span)
        .await
    }

    /// Runs the pipeline, converting panics and the timeout into failures.
    async fn drive_guarded(&self, question: &str, trace: &mut RunTrace) -> FinalAnswer {
        let guarded = AssertUnwindSafe(self.drive(question, trace)).catch_unwind();

        let outcome = match self.config.ask_timeout {
            Some(limit) => match tokio::time::timeout(limit, guarded).await {
                Ok(outcome) => outcome,
                Err(_) => Ok(Err(PipelineFailure::TimedOut {
                    seconds: limit.as_secs_f64(),
                })),
            },
            None => guarded.await,
        };

        match outcome {
            Ok(Ok(text)) => FinalAnswer::Answer(text),
            Ok(Err(failure)) => FinalAnswer::Failure(failure),
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                warn!(error = %message, "Pipeline panicked");
                FinalAnswer::Failure(PipelineFailure::Critical(message))
            }
        }
    }

    async fn drive(&self, question: &str, trace: &mut RunTrace) -> Result<String, PipelineFailure> {
        let entities = self
            .invoker
            .extract_entities(question)
            .await
            .map_err(stage_failed(StageName::ExtractEntities))?;
        trace.enter(PipelineState::EntitiesExtracted);

        let query = self
            .invoker
            .synthesize_query(question, &entities)
            .await
            .map_err(stage_failed(StageName::SynthesizeQuery))?;
        trace.enter(PipelineState::QuerySynthesized);

        let validated = self
            .invoker
            .validate_query(question, &entities, &query)
            .await
            .map_err(stage_failed(StageName::ValidateQuery))?;
        trace.enter(PipelineState::QueryValidated);

        let result = self.execute_with_repair(validated, trace).await?;

        self.invoker
            .synthesize_answer(question, &result)
            .await
            .map_err(stage_failed(StageName::SynthesizeAnswer))
    }

    /// The bounded execute/repair loop.
    ///
    /// Exactly one artifact is live per attempt. A repair that fails leaves
    /// a degraded artifact in its place, which spends the next attempt.
    async fn execute_with_repair(
        &self,
        mut live: QueryArtifact,
        trace: &mut RunTrace,
    ) -> Result<ExecutionResult, PipelineFailure> {
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            trace.enter(PipelineState::Executing { attempt });
            trace.execute_attempts += 1;

            let error = match self.invoker.execute_query(&live).await {
                Ok(result @ ExecutionResult::Rows(_)) => {
                    info!(attempt, rows = result.row_count(), "Query succeeded");
                    return Ok(result);
                }
                Ok(ExecutionResult::Error(error)) => error,
                Err(failure) => failure.to_string(),
            };
            warn!(attempt, max_attempts, error = %error, "Query failed");

            if attempt >= max_attempts {
                return Err(PipelineFailure::RetriesExhausted {
                    attempts: attempt,
                    last_error: error,
                });
            }

            trace.repair_attempts += 1;
            live = match self.invoker.repair_query(&live, &error).await {
                Ok(repaired) => repaired,
                Err(failure) => {
                    warn!(attempt, error = %failure, "Repair failed, continuing with degraded query");
                    QueryArtifact::degraded(failure.to_string())
                }
            };
            self.sink.try_emit(
                events::QUERY_REPAIRED,
                Some(serde_json::json!({
                    "run_id": trace.run_id.to_string(),
                    "attempt": attempt,
                    "degraded": live.is_degraded(),
                })),
            );

            attempt += 1;
        }
    }

    async fn finish(&self, run: &PipelineRun) {
        match &run.answer {
            FinalAnswer::Answer(_) => {
                info!(
                    execute_attempts = run.execute_attempts,
                    repair_attempts = run.repair_attempts,
                    "Pipeline completed"
                );
                self.sink.try_emit(
                    events::PIPELINE_COMPLETED,
                    Some(serde_json::json!({
                        "run_id": run.run_id.to_string(),
                        "execute_attempts": run.execute_attempts,
                    })),
                );
            }
            FinalAnswer::Failure(failure) => {
                warn!(error = %failure, "Pipeline failed");
                let mut payload = serde_json::json!(failure.to_dict());
                payload["run_id"] = serde_json::json!(run.run_id.to_string());
                self.sink.try_emit(events::PIPELINE_FAILED, Some(payload));
            }
        }

        self.sink
            .emit(events::PIPELINE_WIDE, Some(events::build_run_payload(run)))
            .await;
    }
}

impl std::fmt::Debug for PipelineOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineOrchestrator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
