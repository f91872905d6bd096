//! JSON-RPC client session over any async byte stream.

use super::protocol::{
    CallToolParams, CallToolResult, ListToolsResult, RpcRequest, RpcResponse, METHOD_CALL_TOOL,
    METHOD_INITIALIZE, METHOD_INITIALIZED, METHOD_LIST_TOOLS, PROTOCOL_VERSION,
};
use super::Session;
use crate::errors::{InvocationError, SessionError};
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;
use tracing::{debug, trace};

type Reader = Box<dyn AsyncBufRead + Send + Unpin>;
type Writer = Box<dyn AsyncWrite + Send + Unpin>;

struct Transport {
    reader: Reader,
    writer: Writer,
    /// Bytes of a response line not yet terminated. Kept across requests so
    /// a request dropped mid-read leaves the stream aligned for the next one.
    pending: Vec<u8>,
}

/// A client session speaking line-delimited JSON-RPC.
///
/// One request is in flight at a time; the transport is held behind an
/// async mutex for the full request/response exchange.
pub struct RpcSession {
    label: String,
    transport: Mutex<Option<Transport>>,
    next_id: AtomicU64,
}

impl RpcSession {
    /// Connects over `reader`/`writer` and performs the handshake.
    pub async fn connect<R, W>(
        label: impl Into<String>,
        reader: R,
        writer: W,
    ) -> Result<Self, SessionError>
    where
        R: AsyncBufRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let session = Self {
            label: label.into(),
            transport: Mutex::new(Some(Transport {
                reader: Box::new(reader),
                writer: Box::new(writer),
                pending: Vec::new(),
            })),
            next_id: AtomicU64::new(1),
        };

        let init = session
            .request(
                METHOD_INITIALIZE,
                Some(serde_json::json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": {},
                    "clientInfo": {
                        "name": "queryflow",
                        "version": env!("CARGO_PKG_VERSION"),
                    },
                })),
            )
            .await?;
        debug!(
            server = %session.label,
            server_info = %init.get("serverInfo").cloned().unwrap_or_default(),
            "Session initialized"
        );
        session.notify(METHOD_INITIALIZED).await?;

        Ok(session)
    }

    /// Returns the label given at connect time.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Sends a request and waits for its response.
    pub async fn request(
        &self,
        method: &str,
        params: Option<serde_json::Value>,
    ) -> Result<serde_json::Value, SessionError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let request = RpcRequest::new(id, method, params);

        let mut guard = self.transport.lock().await;
        let transport = guard.as_mut().ok_or(SessionError::Closed)?;

        write_message(&mut transport.writer, &request).await?;

        let expected = serde_json::json!(id);
        loop {
            let read = transport
                .reader
                .read_until(b'\n', &mut transport.pending)
                .await?;
            if read == 0 && transport.pending.is_empty() {
                return Err(SessionError::Closed);
            }
            let raw = std::mem::take(&mut transport.pending);
            let line = String::from_utf8_lossy(&raw);
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let message: serde_json::Value = serde_json::from_str(line)?;
            if message.get("method").is_some() {
                trace!(server = %self.label, message = %line, "Ignoring server-initiated message");
                continue;
            }

            let response: RpcResponse = serde_json::from_value(message)?;
            if response.id != expected {
                trace!(server = %self.label, id = %response.id, "Ignoring response for another request");
                continue;
            }

            if let Some(error) = response.error {
                return Err(SessionError::Remote {
                    code: error.code,
                    message: error.message,
                });
            }
            return Ok(response.result.unwrap_or(serde_json::Value::Null));
        }
    }

    /// Sends a notification.
    pub async fn notify(&self, method: &str) -> Result<(), SessionError> {
        let mut guard = self.transport.lock().await;
        let transport = guard.as_mut().ok_or(SessionError::Closed)?;
        write_message(&mut transport.writer, &RpcRequest::notification(method)).await
    }

    /// Returns true once the transport has been released.
    pub async fn is_closed(&self) -> bool {
        self.transport.lock().await.is_none()
    }
}

async fn write_message(writer: &mut Writer, request: &RpcRequest) -> Result<(), SessionError> {
    let mut line = serde_json::to_string(request)?;
    line.push('\n');
    writer.write_all(line.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

#[async_trait]
impl Session for RpcSession {
    async fn list_capabilities(&self) -> Result<Vec<String>, SessionError> {
        let result = self.request(METHOD_LIST_TOOLS, None).await?;
        let listing: ListToolsResult = serde_json::from_value(result)?;
        Ok(listing.tools.into_iter().map(|t| t.name).collect())
    }

    async fn invoke_capability(
        &self,
        name: &str,
        input: serde_json::Value,
    ) -> Result<String, InvocationError> {
        let params = CallToolParams {
            name: name.to_string(),
            arguments: input,
        };
        let params = serde_json::to_value(params)
            .map_err(|e| InvocationError::new(name, e.to_string()))?;

        let result = self
            .request(METHOD_CALL_TOOL, Some(params))
            .await
            .map_err(|e| InvocationError::new(name, e.to_string()))?;
        let result: CallToolResult = serde_json::from_value(result)
            .map_err(|e| InvocationError::new(name, format!("Malformed call result: {e}")))?;

        if result.is_error {
            return Err(InvocationError::new(name, result.text()));
        }
        Ok(result.text())
    }

    async fn close(&self) -> Result<(), SessionError> {
        if let Some(mut transport) = self.transport.lock().await.take() {
            transport.writer.shutdown().await?;
            debug!(server = %self.label, "Session closed");
        }
        Ok(())
    }
}

impl std::fmt::Debug for RpcSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcSession")
            .field("label", &self.label)
            .field("next_id", &self.next_id.load(Ordering::SeqCst))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::{AsyncWriteExt, BufReader};

    async fn next_request<R: AsyncBufRead + Unpin>(reader: &mut R) -> serde_json::Value {
        let mut line = String::new();
        reader.read_line(&mut line).await.unwrap();
        serde_json::from_str(&line).unwrap()
    }

    fn response_line(id: &serde_json::Value, result: serde_json::Value) -> String {
        let mut line = serde_json::to_string(&RpcResponse::success(id.clone(), result)).unwrap();
        line.push('\n');
        line
    }

    #[tokio::test]
    async fn test_request_dropped_mid_line_keeps_stream_aligned() {
        let (client_io, server_io) = tokio::io::duplex(4096);
        let (server_read, mut server_write) = tokio::io::split(server_io);
        let (client_read, client_write) = tokio::io::split(client_io);

        let server = tokio::spawn(async move {
            let mut reader = BufReader::new(server_read);

            let init = next_request(&mut reader).await;
            let reply = response_line(&init["id"], serde_json::json!({"serverInfo": {}}));
            server_write.write_all(reply.as_bytes()).await.unwrap();
            next_request(&mut reader).await;

            let slow = next_request(&mut reader).await;
            let late = response_line(&slow["id"], serde_json::json!("late"));
            let (head, tail) = late.split_at(late.len() / 2);
            server_write.write_all(head.as_bytes()).await.unwrap();
            server_write.flush().await.unwrap();

            let retry = next_request(&mut reader).await;
            server_write.write_all(tail.as_bytes()).await.unwrap();
            let pong = response_line(&retry["id"], serde_json::json!("pong"));
            server_write.write_all(pong.as_bytes()).await.unwrap();
            server_write.flush().await.unwrap();
        });

        let session = RpcSession::connect("test", BufReader::new(client_read), client_write)
            .await
            .unwrap();

        let dropped =
            tokio::time::timeout(Duration::from_millis(50), session.request("ping", None)).await;
        assert!(dropped.is_err());

        let result = session.request("ping", None).await.unwrap();
        assert_eq!(result, serde_json::json!("pong"));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_eof_is_closed() {
        let (client_io, server_io) = tokio::io::duplex(1024);
        let (client_read, client_write) = tokio::io::split(client_io);
        drop(server_io);

        let err = RpcSession::connect("test", BufReader::new(client_read), client_write)
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::Closed | SessionError::Io(_)));
    }
}
