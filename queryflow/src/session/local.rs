//! In-process session over a capability registry.

use super::Session;
use crate::capabilities::CapabilityRegistry;
use crate::errors::{InvocationError, SessionError};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A session whose capabilities run in the calling process.
#[derive(Debug)]
pub struct LocalSession {
    registry: Arc<CapabilityRegistry>,
    closed: AtomicBool,
}

impl LocalSession {
    /// Creates a session over `registry`.
    #[must_use]
    pub fn new(registry: Arc<CapabilityRegistry>) -> Self {
        Self {
            registry,
            closed: AtomicBool::new(false),
        }
    }

    /// Returns true once [`Session::close`] has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Session for LocalSession {
    async fn list_capabilities(&self) -> Result<Vec<String>, SessionError> {
        if self.is_closed() {
            return Err(SessionError::Closed);
        }
        Ok(self.registry.names())
    }

    async fn invoke_capability(
        &self,
        name: &str,
        input: serde_json::Value,
    ) -> Result<String, InvocationError> {
        if self.is_closed() {
            return Err(InvocationError::new(name, SessionError::Closed.to_string()));
        }
        self.registry.invoke(name, input).await
    }

    async fn close(&self) -> Result<(), SessionError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}
