//! Orchestrator configuration.

use std::time::Duration;

/// Default bound on execute attempts.
pub const DEFAULT_MAX_ATTEMPTS: usize = 3;

/// Configuration for a [`PipelineOrchestrator`](super::PipelineOrchestrator).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Maximum execute attempts, including the first. Never below 1.
    pub max_attempts: usize,
    /// Timeout wrapping the whole question, if any.
    pub ask_timeout: Option<Duration>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            ask_timeout: None,
        }
    }
}

impl PipelineConfig {
    /// Creates the default config.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum execute attempts, clamped to at least 1.
    #[must_use]
    pub fn with_max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Bounds the whole question by `timeout`.
    #[must_use]
    pub fn with_ask_timeout(mut self, timeout: Duration) -> Self {
        self.ask_timeout = Some(timeout);
        self
    }
}
