//! Error types for the queryflow pipeline.
//!
//! Stage boundaries never raise: every fault is converted into one of the
//! structured types below before it reaches the orchestrator. Only
//! [`PipelineFailure`] is ever shown to the caller, and then as text.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use crate::stages::StageName;

/// The main error type for queryflow operations outside the pipeline itself.
///
/// Raised while building the stages or opening a session; once a question
/// is running every fault is a [`PipelineFailure`] instead.
#[derive(Debug, Error)]
pub enum QueryflowError {
    /// The session to the stage-execution environment failed.
    #[error("{0}")]
    Session(#[from] SessionError),

    /// Configuration could not be loaded.
    #[error("{0}")]
    Config(#[from] ConfigError),

    /// A language-model client could not be built.
    #[error("{0}")]
    Llm(#[from] LlmError),
}

/// Raised when an external capability is unreachable or rejects the call.
///
/// Carries a message and never a partial payload.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("Invocation of '{capability}' failed: {message}")]
pub struct InvocationError {
    /// The capability that was being invoked.
    pub capability: String,
    /// What went wrong.
    pub message: String,
}

impl InvocationError {
    /// Creates a new invocation error.
    #[must_use]
    pub fn new(capability: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            capability: capability.into(),
            message: message.into(),
        }
    }

    /// Creates an error for a capability that is not registered.
    #[must_use]
    pub fn unknown_capability(capability: impl Into<String>) -> Self {
        let capability = capability.into();
        let message = format!("Unknown capability: {capability}");
        Self {
            capability,
            message,
        }
    }
}

/// Raised when no structured object can be decoded from a response.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{message}")]
pub struct ParseFailure {
    /// Diagnostic message.
    pub message: String,
    /// The text span that was handed to the decoder, if one was found.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub candidate: Option<String>,
}

impl ParseFailure {
    /// Creates a parse failure with no candidate span.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            candidate: None,
        }
    }

    /// Attaches the span that failed to decode.
    #[must_use]
    pub fn with_candidate(mut self, candidate: impl Into<String>) -> Self {
        self.candidate = Some(candidate.into());
        self
    }
}

/// Why a single typed stage call did not produce its payload.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StageFailure {
    /// The capability could not be invoked.
    #[error("{0}")]
    Invocation(#[from] InvocationError),

    /// The reply could not be decoded.
    #[error("{0}")]
    Parse(#[from] ParseFailure),

    /// The capability ran and reported an error payload.
    #[error("{0}")]
    Reported(String),
}

impl StageFailure {
    /// Returns a short machine-readable kind.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Invocation(_) => "invocation",
            Self::Parse(_) => "parse",
            Self::Reported(_) => "reported",
        }
    }
}

/// Terminal outcome of a pipeline run that did not produce an answer.
///
/// Always surfaced to the caller as text via [`std::fmt::Display`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PipelineFailure {
    /// A fail-fast stage did not produce its payload.
    #[error("The {stage} stage failed: {reason}")]
    StageFailed {
        /// The stage that failed.
        stage: StageName,
        /// The underlying failure.
        reason: StageFailure,
    },

    /// Every execute attempt reported an error.
    #[error("Failed to execute the query after {attempts} attempts. Last error: {last_error}")]
    RetriesExhausted {
        /// How many execute attempts were made.
        attempts: usize,
        /// The last execution error observed.
        last_error: String,
    },

    /// The caller-level timeout elapsed.
    #[error("The pipeline timed out after {seconds:.1}s")]
    TimedOut {
        /// The configured timeout in seconds.
        seconds: f64,
    },

    /// An unexpected fault escaped a stage boundary.
    #[error("A critical error occurred in the pipeline: {0}")]
    Critical(String),
}

impl PipelineFailure {
    /// Converts to a dictionary representation for event payloads.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();

        match self {
            Self::StageFailed { stage, reason } => {
                map.insert("type".to_string(), serde_json::json!("StageFailed"));
                map.insert("stage".to_string(), serde_json::json!(stage.as_str()));
                map.insert("kind".to_string(), serde_json::json!(reason.kind()));
            }
            Self::RetriesExhausted {
                attempts,
                last_error,
            } => {
                map.insert("type".to_string(), serde_json::json!("RetriesExhausted"));
                map.insert("attempts".to_string(), serde_json::json!(attempts));
                map.insert("last_error".to_string(), serde_json::json!(last_error));
            }
            Self::TimedOut { seconds } => {
                map.insert("type".to_string(), serde_json::json!("TimedOut"));
                map.insert("timeout_seconds".to_string(), serde_json::json!(seconds));
            }
            Self::Critical(_) => {
                map.insert("type".to_string(), serde_json::json!("Critical"));
            }
        }

        map.insert("message".to_string(), serde_json::json!(self.to_string()));
        map
    }
}

/// Errors from the channel to the stage-execution environment.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The server process could not be started.
    #[error("Failed to spawn stage server '{command}': {reason}")]
    Spawn {
        /// The command that was run.
        command: String,
        /// The reason for failure.
        reason: String,
    },

    /// The session has already been closed.
    #[error("Session is closed")]
    Closed,

    /// The peer sent something that is not valid protocol.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The peer answered with a JSON-RPC error.
    #[error("Remote error {code}: {message}")]
    Remote {
        /// JSON-RPC error code.
        code: i64,
        /// JSON-RPC error message.
        message: String,
    },

    /// Transport IO failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for SessionError {
    fn from(err: serde_json::Error) -> Self {
        Self::Protocol(err.to_string())
    }
}

/// Errors loading configuration from the environment.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A required variable is not set.
    #[error("Missing required environment variable: {0}")]
    Missing(String),

    /// A variable is set but cannot be parsed.
    #[error("Invalid value for {key}: '{value}' ({reason})")]
    Invalid {
        /// The variable name.
        key: String,
        /// The raw value.
        value: String,
        /// Why it was rejected.
        reason: String,
    },
}

/// Errors from a language-model call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LlmError {
    /// The HTTP request could not be completed.
    #[error("LLM request failed: {0}")]
    Request(String),

    /// The provider answered with a non-success status.
    #[error("LLM API returned {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body.
        body: String,
    },

    /// The provider response had no usable text.
    #[error("LLM response was empty")]
    EmptyResponse,

    /// No API credential was configured.
    #[error("No API key configured")]
    MissingApiKey,
}

/// Errors reading the data store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The store could not be opened.
    #[error("Failed to open '{path}': {reason}")]
    Open {
        /// Location of the store.
        path: String,
        /// The reason for failure.
        reason: String,
    },

    /// A statement failed.
    #[error("{0}")]
    Query(String),

    /// The blocking worker running the statement did not finish.
    #[error("Store task failed: {0}")]
    Task(String),
}
