//! Session over a spawned stage-server process.

use super::{RpcSession, Session};
use crate::errors::{InvocationError, SessionError};
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::BufReader;
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// How long a closed server gets to exit before it is killed.
const EXIT_GRACE: Duration = Duration::from_secs(5);

/// A session to a child process speaking JSON-RPC on stdin/stdout.
///
/// The child is killed if the session is dropped without being closed.
pub struct StdioSession {
    rpc: RpcSession,
    child: Mutex<Option<Child>>,
    command: String,
}

impl StdioSession {
    /// Spawns `command args...` and performs the handshake.
    pub async fn spawn(command: &str, args: &[String]) -> Result<Self, SessionError> {
        if command.trim().is_empty() {
            return Err(SessionError::Spawn {
                command: command.to_string(),
                reason: "empty command".to_string(),
            });
        }

        debug!(command, ?args, "Spawning stage server");
        let mut child = Command::new(command)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| SessionError::Spawn {
                command: command.to_string(),
                reason: e.to_string(),
            })?;

        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            return Err(SessionError::Spawn {
                command: command.to_string(),
                reason: "child stdio was not captured".to_string(),
            });
        };

        let rpc = RpcSession::connect(command, BufReader::new(stdout), stdin).await?;

        Ok(Self {
            rpc,
            child: Mutex::new(Some(child)),
            command: command.to_string(),
        })
    }

    /// Parses a shell-like command line (whitespace separated) and spawns it.
    pub async fn spawn_command_line(command_line: &str) -> Result<Self, SessionError> {
        let mut parts = command_line.split_whitespace().map(String::from);
        let command = parts.next().unwrap_or_default();
        let args: Vec<String> = parts.collect();
        Self::spawn(&command, &args).await
    }
}

#[async_trait]
impl Session for StdioSession {
    async fn list_capabilities(&self) -> Result<Vec<String>, SessionError> {
        self.rpc.list_capabilities().await
    }

    async fn invoke_capability(
        &self,
        name: &str,
        input: serde_json::Value,
    ) -> Result<String, InvocationError> {
        self.rpc.invoke_capability(name, input).await
    }

    async fn close(&self) -> Result<(), SessionError> {
        self.rpc.close().await?;

        let Some(mut child) = self.child.lock().await.take() else {
            return Ok(());
        };

        match tokio::time::timeout(EXIT_GRACE, child.wait()).await {
            Ok(Ok(status)) => debug!(command = %self.command, %status, "Stage server exited"),
            Ok(Err(e)) => warn!(command = %self.command, error = %e, "Error waiting for stage server"),
            Err(_) => {
                warn!(command = %self.command, "Stage server did not exit, killing it");
                if let Err(e) = child.kill().await {
                    warn!(command = %self.command, error = %e, "Failed to kill stage server");
                }
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for StdioSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StdioSession")
            .field("command", &self.command)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_empty_command_is_rejected() {
        let err = StdioSession::spawn_command_line("   ").await.unwrap_err();
        assert!(matches!(err, SessionError::Spawn { .. }));
    }

    #[tokio::test]
    async fn test_missing_binary_is_spawn_error() {
        let err = StdioSession::spawn("/definitely/not/a/real/binary", &[])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Failed to spawn"));
    }
}
