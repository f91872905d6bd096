//! Scripted session for driving the orchestrator in tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::errors::{InvocationError, SessionError};
use crate::session::Session;
use crate::stages::StageName;

/// What a scripted stage does when called.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptedReply {
    /// Reply with this text.
    Text(String),
    /// Fail the call with an invocation error.
    InvocationError(String),
    /// Panic inside the call.
    Panic(String),
}

/// A [`Session`] that answers each stage from a scripted queue.
///
/// Replies for a stage are consumed in order. The last reply is sticky: once
/// a queue is down to one entry it answers every further call. A stage with
/// nothing scripted fails with an invocation error.
#[derive(Debug, Default)]
pub struct ScriptedSession {
    replies: Mutex<HashMap<StageName, VecDeque<ScriptedReply>>>,
    calls: Mutex<Vec<(String, serde_json::Value)>>,
    delay: Option<Duration>,
    closed: AtomicBool,
}

impl ScriptedSession {
    /// Creates a session with nothing scripted.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a reply for a stage.
    #[must_use]
    pub fn with(self, stage: StageName, reply: ScriptedReply) -> Self {
        self.replies.lock().entry(stage).or_default().push_back(reply);
        self
    }

    /// Queues a text reply for a stage.
    #[must_use]
    pub fn with_reply(self, stage: StageName, text: impl Into<String>) -> Self {
        self.with(stage, ScriptedReply::Text(text.into()))
    }

    /// Queues an invocation error for a stage.
    #[must_use]
    pub fn with_invocation_error(self, stage: StageName, message: impl Into<String>) -> Self {
        self.with(stage, ScriptedReply::InvocationError(message.into()))
    }

    /// Queues a panic for a stage.
    #[must_use]
    pub fn with_panic(self, stage: StageName, message: impl Into<String>) -> Self {
        self.with(stage, ScriptedReply::Panic(message.into()))
    }

    /// Sleeps this long before every reply.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Returns how many times a stage was called.
    #[must_use]
    pub fn calls_to(&self, stage: StageName) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|(name, _)| name == stage.as_str())
            .count()
    }

    /// Returns the inputs a stage was called with, in call order.
    #[must_use]
    pub fn inputs_to(&self, stage: StageName) -> Vec<serde_json::Value> {
        self.calls
            .lock()
            .iter()
            .filter(|(name, _)| name == stage.as_str())
            .map(|(_, input)| input.clone())
            .collect()
    }

    /// Returns every called capability name, in call order.
    #[must_use]
    pub fn call_log(&self) -> Vec<String> {
        self.calls.lock().iter().map(|(name, _)| name.clone()).collect()
    }

    /// Returns true once the session has been closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn next_reply(&self, stage: StageName) -> Option<ScriptedReply> {
        let mut replies = self.replies.lock();
        let queue = replies.get_mut(&stage)?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }
}

#[async_trait]
impl Session for ScriptedSession {
    async fn list_capabilities(&self) -> Result<Vec<String>, SessionError> {
        if self.is_closed() {
            return Err(SessionError::Closed);
        }
        Ok(StageName::ALL.iter().map(|s| s.as_str().to_string()).collect())
    }

    async fn invoke_capability(
        &self,
        name: &str,
        input: serde_json::Value,
    ) -> Result<String, InvocationError> {
        if self.is_closed() {
            return Err(InvocationError::new(name, SessionError::Closed.to_string()));
        }
        self.calls.lock().push((name.to_string(), input));

        let stage: StageName = name
            .parse()
            .map_err(|_| InvocationError::unknown_capability(name))?;

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match self.next_reply(stage) {
            Some(ScriptedReply::Text(text)) => Ok(text),
            Some(ScriptedReply::InvocationError(message)) => Err(InvocationError::new(name, message)),
            Some(ScriptedReply::Panic(message)) => panic!("{message}"),
            None => Err(InvocationError::new(name, "No scripted reply")),
        }
    }

    async fn close(&self) -> Result<(), SessionError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_replies_are_consumed_then_sticky() {
        let session = ScriptedSession::new()
            .with_reply(StageName::ExecuteQuery, "first")
            .with_reply(StageName::ExecuteQuery, "second");

        for expected in ["first", "second", "second"] {
            let out = session
                .invoke_capability("execute_query", serde_json::json!({}))
                .await
                .unwrap();
            assert_eq!(out, expected);
        }
        assert_eq!(session.calls_to(StageName::ExecuteQuery), 3);
    }

    #[tokio::test]
    async fn test_unscripted_stage_fails() {
        let session = ScriptedSession::new();
        assert!(session
            .invoke_capability("repair_query", serde_json::json!({}))
            .await
            .is_err());
        assert_eq!(session.call_log(), vec!["repair_query"]);
    }

    #[tokio::test]
    async fn test_unknown_capability() {
        let err = ScriptedSession::new()
            .invoke_capability("drop_tables", serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(err.message.contains("Unknown capability"));
    }
}
