//! # Queryflow
//!
//! A self-healing question-to-SQL pipeline orchestrator.
//!
//! A natural-language question flows through six stages, each invoked as a
//! named capability on a session:
//!
//! - **Extraction and synthesis**: entities are pulled from the question and a
//!   query is written against them
//! - **Validation**: the query is checked against the live schema
//! - **Bounded repair**: failed executions are fed back for repair, up to a
//!   configurable number of attempts
//! - **Answer synthesis**: the rows become a natural-language answer
//!
//! Every failure is reified as a [`PipelineFailure`](errors::PipelineFailure);
//! asking a question never panics and never returns an `Err`.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use queryflow::prelude::*;
//!
//! let config = AppConfig::from_env()?;
//! let session = Arc::new(LocalSession::new(Arc::new(registry_from_config(&config)?)));
//! let orchestrator = PipelineOrchestrator::new(session)
//!     .with_config(config.pipeline_config());
//!
//! let answer = orchestrator
//!     .ask("How many electric vehicles are registered in King County?")
//!     .await;
//! println!("{answer}");
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

pub mod capabilities;
pub mod config;
pub mod core;
pub mod errors;
pub mod events;
pub mod observability;
pub mod parser;
pub mod pipeline;
pub mod session;
pub mod stages;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::capabilities::{
        build_registry, Capability, CapabilityRegistry, DataStore, GenerationSettings,
        LanguageModel,
    };
    #[cfg(all(feature = "anthropic", feature = "sqlite"))]
    pub use crate::capabilities::registry_from_config;
    pub use crate::config::AppConfig;
    pub use crate::core::{
        EntitySet, ExecutionResult, FinalAnswer, PipelineState, QueryArtifact, Row,
    };
    pub use crate::errors::{
        InvocationError, ParseFailure, PipelineFailure, QueryflowError, SessionError,
        StageFailure,
    };
    pub use crate::events::{EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::pipeline::{PipelineConfig, PipelineOrchestrator, PipelineRun};
    pub use crate::session::{with_session, LocalSession, Session, StdioSession};
    pub use crate::stages::StageName;

    pub use std::sync::Arc;
}
