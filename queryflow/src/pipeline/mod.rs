//! Pipeline orchestration.
//!
//! This module provides:
//! - The orchestrator state machine with its bounded repair loop
//! - Orchestrator configuration
//! - The per-question run record

mod config;
mod orchestrator;
mod run;

pub use config::{PipelineConfig, DEFAULT_MAX_ATTEMPTS};
pub use orchestrator::PipelineOrchestrator;
pub use run::PipelineRun;
