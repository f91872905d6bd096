//! Serves a capability registry over line-delimited JSON-RPC.

use super::protocol::{
    CallToolParams, CallToolResult, ListToolsResult, RpcRequest, RpcResponse, INVALID_PARAMS,
    METHOD_CALL_TOOL, METHOD_INITIALIZE, METHOD_LIST_TOOLS, METHOD_NOT_FOUND, METHOD_PING,
    PARSE_ERROR, PROTOCOL_VERSION,
};
use crate::capabilities::CapabilityRegistry;
use crate::errors::SessionError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, info, warn};

/// Identity announced by the server during the handshake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerInfo {
    /// Server name.
    pub name: String,
    /// Server version.
    pub version: String,
}

impl Default for ServerInfo {
    fn default() -> Self {
        Self {
            name: "queryflow-stages".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Serves `registry` until the reader reaches end of input.
///
/// Capability failures are answered as `isError` results, never as
/// transport errors, so one bad call does not end the session.
pub async fn serve<R, W>(
    registry: Arc<CapabilityRegistry>,
    info: ServerInfo,
    mut reader: R,
    mut writer: W,
) -> Result<(), SessionError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    info!(server = %info.name, capabilities = ?registry.names(), "Stage server started");

    loop {
        let mut line = String::new();
        if reader.read_line(&mut line).await? == 0 {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let request: RpcRequest = match serde_json::from_str(line) {
            Ok(request) => request,
            Err(e) => {
                warn!(error = %e, "Received malformed request");
                let response = RpcResponse::failure(
                    serde_json::Value::Null,
                    PARSE_ERROR,
                    format!("Parse error: {e}"),
                );
                write_response(&mut writer, &response).await?;
                continue;
            }
        };

        let Some(id) = request.id.clone() else {
            debug!(method = %request.method, "Received notification");
            continue;
        };

        let response = handle(&registry, &info, id, request).await;
        write_response(&mut writer, &response).await?;
    }

    info!(server = %info.name, "Stage server stopped");
    Ok(())
}

/// Serves `registry` on the process's stdin/stdout.
pub async fn serve_stdio(registry: Arc<CapabilityRegistry>) -> Result<(), SessionError> {
    serve(
        registry,
        ServerInfo::default(),
        BufReader::new(tokio::io::stdin()),
        tokio::io::stdout(),
    )
    .await
}

async fn handle(
    registry: &CapabilityRegistry,
    info: &ServerInfo,
    id: serde_json::Value,
    request: RpcRequest,
) -> RpcResponse {
    match request.method.as_str() {
        METHOD_INITIALIZE => RpcResponse::success(
            id,
            serde_json::json!({
                "protocolVersion": PROTOCOL_VERSION,
                "serverInfo": info,
                "capabilities": {"tools": {}},
            }),
        ),
        METHOD_PING => RpcResponse::success(id, serde_json::json!({})),
        METHOD_LIST_TOOLS => {
            let listing = ListToolsResult {
                tools: registry.describe(),
            };
            match serde_json::to_value(listing) {
                Ok(value) => RpcResponse::success(id, value),
                Err(e) => RpcResponse::failure(id, INVALID_PARAMS, e.to_string()),
            }
        }
        METHOD_CALL_TOOL => {
            let params: CallToolParams =
                match serde_json::from_value(request.params.unwrap_or_default()) {
                    Ok(params) => params,
                    Err(e) => {
                        return RpcResponse::failure(
                            id,
                            INVALID_PARAMS,
                            format!("Invalid tools/call params: {e}"),
                        )
                    }
                };

            debug!(capability = %params.name, "Serving capability call");
            let result = match registry.invoke(&params.name, params.arguments).await {
                Ok(text) => CallToolResult::ok(text),
                Err(e) => {
                    warn!(capability = %params.name, error = %e, "Capability failed");
                    CallToolResult::error(e.message)
                }
            };

            match serde_json::to_value(result) {
                Ok(value) => RpcResponse::success(id, value),
                Err(e) => RpcResponse::failure(id, INVALID_PARAMS, e.to_string()),
            }
        }
        other => RpcResponse::failure(id, METHOD_NOT_FOUND, format!("Method not found: {other}")),
    }
}

async fn write_response<W>(writer: &mut W, response: &RpcResponse) -> Result<(), SessionError>
where
    W: AsyncWrite + Unpin,
{
    let mut line = serde_json::to_string(response)?;
    line.push('\n');
    writer.write_all(line.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}
