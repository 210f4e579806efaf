//! Stdio transport: newline-delimited JSON-RPC on stdin/stdout.
//!
//! One session for the process lifetime, same state machine as SSE.

use crate::protocol::{JsonRpcRequest, JsonRpcResponse, PARSE_ERROR};
use crate::server::{McpServer, SessionState};
use sqlgate_core::GatewayResult;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

/// Serve JSON-RPC over stdin/stdout until EOF.
pub async fn serve(server: Arc<McpServer>) -> GatewayResult<()> {
    let stdin = BufReader::new(tokio::io::stdin());
    let mut stdout = tokio::io::stdout();
    let mut lines = stdin.lines();
    let session = SessionState::new();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<JsonRpcRequest>(&line) {
            Ok(request) => server.handle_request(&session, request).await,
            Err(e) => Some(JsonRpcResponse::error(
                None,
                PARSE_ERROR,
                format!("parse error: {e}"),
            )),
        };

        if let Some(response) = response {
            let mut payload = serde_json::to_vec(&response).unwrap_or_default();
            payload.push(b'\n');
            stdout.write_all(&payload).await?;
            stdout.flush().await?;
        }
    }

    tracing::info!("stdin closed, stdio transport done");
    Ok(())
}
