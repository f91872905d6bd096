//! Event sink system for observability.
//!
//! The orchestrator emits an event at every state transition and stage
//! call. Sinks are held by the orchestrator instance.

mod sink;
mod wide;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};
pub use wide::build_run_payload;

/// Emitted once when a question enters the pipeline.
pub const PIPELINE_STARTED: &str = "pipeline.started";
/// Emitted on every state transition.
pub const PIPELINE_STATE: &str = "pipeline.state";
/// Emitted when an answer is produced.
pub const PIPELINE_COMPLETED: &str = "pipeline.completed";
/// Emitted when the pipeline ends without an answer.
pub const PIPELINE_FAILED: &str = "pipeline.failed";
/// Summary of the whole run.
pub const PIPELINE_WIDE: &str = "pipeline.wide";
/// Emitted before every stage call.
pub const STAGE_INVOKED: &str = "stage.invoked";
/// Emitted when a stage call produced its payload.
pub const STAGE_COMPLETED: &str = "stage.completed";
/// Emitted when a stage call did not produce its payload.
pub const STAGE_FAILED: &str = "stage.failed";
/// Emitted when the live query artifact is replaced by a repair.
pub const QUERY_REPAIRED: &str = "query.repaired";
