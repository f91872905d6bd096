//! Record of one question's trip through the pipeline.

use crate::core::{FinalAnswer, PipelineState};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Everything observed while answering one question.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineRun {
    /// Unique id of this run.
    pub run_id: Uuid,
    /// The question as asked.
    pub question: String,
    /// The answer, or why there is none.
    pub answer: FinalAnswer,
    /// States visited, in order, starting at `Init` and ending terminal.
    pub states: Vec<PipelineState>,
    /// Number of execute calls made.
    pub execute_attempts: usize,
    /// Number of repair calls made.
    pub repair_attempts: usize,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the run ended.
    pub ended_at: DateTime<Utc>,
}

impl PipelineRun {
    /// Returns true if an answer was produced.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.answer.is_answer()
    }

    /// Returns the last state visited.
    #[must_use]
    pub fn final_state(&self) -> PipelineState {
        self.states.last().copied().unwrap_or_default()
    }

    /// Wall-clock duration in milliseconds.
    #[must_use]
    pub fn duration_ms(&self) -> i64 {
        (self.ended_at - self.started_at).num_milliseconds()
    }

    /// Consumes the run and returns the user-facing text.
    #[must_use]
    pub fn into_text(self) -> String {
        self.answer.into_text()
    }
}
