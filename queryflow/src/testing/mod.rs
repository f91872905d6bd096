//! Testing utilities for queryflow pipelines.
//!
//! This module provides:
//! - A scripted session standing in for the stage-execution environment
//! - Canned replies for the reference dataset
//! - Assertions over runs and call counts

mod assertions;
mod fixtures;
mod mocks;

pub use assertions::{
    assert_answer_contains, assert_call_counts, assert_not_called, assert_run_failed,
    assert_run_succeeded, assert_states,
};
pub use fixtures::{
    execution_error, king_county_always_failing, king_county_prelude, king_county_session,
    king_county_with_repair, query_reply, KING_ANSWER, KING_ENTITIES, KING_QUERY, KING_QUESTION,
    KING_ROWS,
};
pub use mocks::{ScriptedReply, ScriptedSession};
