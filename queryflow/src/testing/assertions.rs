//! Assertions over pipeline runs and scripted sessions.

use super::ScriptedSession;
use crate::core::PipelineState;
use crate::pipeline::PipelineRun;
use crate::stages::StageName;

/// Asserts that the run produced an answer.
pub fn assert_run_succeeded(run: &PipelineRun) {
    assert!(
        run.is_success(),
        "Expected an answer, got failure: {}",
        run.answer
    );
}

/// Asserts that the run ended without an answer.
pub fn assert_run_failed(run: &PipelineRun) {
    assert!(
        !run.is_success(),
        "Expected a failure, got answer: {}",
        run.answer
    );
}

/// Asserts that the answer text contains `needle`.
pub fn assert_answer_contains(run: &PipelineRun, needle: &str) {
    let text = run.answer.to_string();
    assert!(
        text.contains(needle),
        "Expected answer to contain '{needle}', got: {text}"
    );
}

/// Asserts the exact number of calls per stage.
pub fn assert_call_counts(session: &ScriptedSession, expected: &[(StageName, usize)]) {
    for (stage, count) in expected {
        let actual = session.calls_to(*stage);
        assert_eq!(
            actual, *count,
            "Expected {count} call(s) to {stage}, got {actual}. Call log: {:?}",
            session.call_log()
        );
    }
}

/// Asserts that a stage was never called.
pub fn assert_not_called(session: &ScriptedSession, stage: StageName) {
    assert_call_counts(session, &[(stage, 0)]);
}

/// Asserts the visited states, in order.
pub fn assert_states(run: &PipelineRun, expected: &[PipelineState]) {
    assert_eq!(
        run.states, expected,
        "Unexpected state sequence for run {}",
        run.run_id
    );
}
