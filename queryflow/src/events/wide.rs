//! Wide summary payload for a finished run.

use crate::core::FinalAnswer;
use crate::pipeline::PipelineRun;

/// Builds the `pipeline.wide` payload: one event carrying everything needed
/// to reconstruct what happened to a question.
#[must_use]
pub fn build_run_payload(run: &PipelineRun) -> serde_json::Value {
    let status = if run.is_success() { "succeeded" } else { "failed" };
    let states: Vec<String> = run.states.iter().map(ToString::to_string).collect();

    let mut payload = serde_json::json!({
        "run_id": run.run_id.to_string(),
        "question": run.question,
        "status": status,
        "final_state": run.final_state().to_string(),
        "states": states,
        "execute_attempts": run.execute_attempts,
        "repair_attempts": run.repair_attempts,
        "started_at": run.started_at.to_rfc3339(),
        "ended_at": run.ended_at.to_rfc3339(),
        "duration_ms": run.duration_ms(),
    });

    if let FinalAnswer::Failure(failure) = &run.answer {
        payload["failure"] = serde_json::json!(failure.to_dict());
    }

    payload
}
