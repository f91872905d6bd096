//! Sessions to the stage-execution environment.
//!
//! A session is established once per orchestrator and torn down once. It
//! exposes the capability list and single capability calls. Two
//! implementations are provided:
//!
//! - [`LocalSession`] hosts a [`CapabilityRegistry`] in-process.
//! - [`StdioSession`] spawns a stage server and speaks line-delimited
//!   JSON-RPC over its stdin/stdout.
//!
//! [`CapabilityRegistry`]: crate::capabilities::CapabilityRegistry

mod local;
pub mod protocol;
mod rpc;
mod server;
mod stdio;

pub use local::LocalSession;
pub use rpc::RpcSession;
pub use server::{serve, serve_stdio, ServerInfo};
pub use stdio::StdioSession;

use crate::errors::{InvocationError, SessionError};
use async_trait::async_trait;
use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::warn;

/// The channel between the orchestrator and the stage-execution environment.
///
/// Not designed for concurrent questions: implementations may serialize
/// calls, so independent questions should use independent sessions.
#[async_trait]
pub trait Session: Send + Sync {
    /// Lists the capability names the environment offers.
    async fn list_capabilities(&self) -> Result<Vec<String>, SessionError>;

    /// Invokes one capability with a structured input, returning its text.
    async fn invoke_capability(
        &self,
        name: &str,
        input: serde_json::Value,
    ) -> Result<String, InvocationError>;

    /// Releases the underlying transport. Idempotent.
    async fn close(&self) -> Result<(), SessionError>;
}

/// Runs `operation` with a session and closes the session afterwards.
///
/// The session is closed on every exit path, including a panic inside
/// `operation`, which is resumed after the close.
pub async fn with_session<S, F, Fut, T>(session: Arc<S>, operation: F) -> T
where
    S: Session + ?Sized,
    F: FnOnce(Arc<S>) -> Fut,
    Fut: Future<Output = T>,
{
    let outcome = AssertUnwindSafe(operation(Arc::clone(&session)))
        .catch_unwind()
        .await;

    if let Err(e) = session.close().await {
        warn!(error = %e, "Failed to close session");
    }

    match outcome {
        Ok(value) => value,
        Err(panic) => std::panic::resume_unwind(panic),
    }
}

/// Opens the session described by the application config.
///
/// Spawns `server_command` when it is set, otherwise hosts the stages
/// in-process.
#[cfg(all(feature = "anthropic", feature = "sqlite"))]
pub async fn open_from_config(
    config: &crate::config::AppConfig,
) -> Result<Arc<dyn Session>, crate::errors::QueryflowError> {
    if let Some(command_line) = &config.server_command {
        tracing::info!(command = %command_line, "Connecting to stage server");
        let session = StdioSession::spawn_command_line(command_line).await?;
        return Ok(Arc::new(session));
    }

    let registry = crate::capabilities::registry_from_config(config)?;
    Ok(Arc::new(LocalSession::new(Arc::new(registry))))
}
