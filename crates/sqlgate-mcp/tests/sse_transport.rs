//! SSE transport tests against a real listener.

use futures_util::StreamExt;
use serde_json::{json, Value};
use sqlgate_connectors::sqlite::{SqliteConfig, SqliteConnector};
use sqlgate_mcp::sse::{self, SseOptions, SseState};
use sqlgate_mcp::McpServer;
use sqlgate_core::{ApiParams, ColumnType, Endpoint, EndpointParam, ParamLocation};
use std::sync::Arc;
use std::time::Duration;

/// One parsed SSE frame.
#[derive(Debug)]
struct Frame {
    event: String,
    data: String,
}

/// Incremental SSE frame reader over a reqwest byte stream.
struct SseReader {
    stream: std::pin::Pin<
        Box<dyn futures_util::Stream<Item = reqwest::Result<bytes::Bytes>> + Send>,
    >,
    buffer: String,
}

impl SseReader {
    fn new(response: reqwest::Response) -> Self {
        Self {
            stream: Box::pin(response.bytes_stream()),
            buffer: String::new(),
        }
    }

    async fn next_frame(&mut self) -> Frame {
        loop {
            if let Some(frame) = self.pop_frame() {
                return frame;
            }
            let chunk = tokio::time::timeout(Duration::from_secs(10), self.stream.next())
                .await
                .expect("timed out waiting for SSE frame")
                .expect("SSE stream ended unexpectedly")
                .expect("SSE stream errored");
            self.buffer.push_str(&String::from_utf8_lossy(&chunk));
        }
    }

    fn pop_frame(&mut self) -> Option<Frame> {
        loop {
            let boundary = self.buffer.find("\n\n")?;
            let raw: String = self.buffer.drain(..boundary + 2).collect();

            let mut event = String::new();
            let mut data = String::new();
            for line in raw.lines() {
                if let Some(value) = line.strip_prefix("event:") {
                    event = value.trim().to_string();
                } else if let Some(value) = line.strip_prefix("data:") {
                    data = value.trim().to_string();
                }
            }
            // keep-alive comments produce empty frames; skip them
            if event.is_empty() && data.is_empty() {
                continue;
            }
            return Some(Frame { event, data });
        }
    }
}

fn test_endpoint() -> Endpoint {
    Endpoint {
        mcp_method: "echo_number".into(),
        description: "echo a number back".into(),
        query: "SELECT :n AS n".into(),
        is_array_result: true,
        params: vec![EndpointParam {
            name: "n".into(),
            param_type: ColumnType::Integer,
            location: ParamLocation::Body,
            required: true,
            default: None,
        }],
        ..Default::default()
    }
}

async fn spawn_server(options: SseOptions) -> (String, Arc<SseState>) {
    let connector = SqliteConnector::open(SqliteConfig {
        conn_string: "sqlite::memory:".into(),
        ..Default::default()
    })
    .unwrap();

    let mut server = McpServer::new(ApiParams::default());
    server.set_connector(Arc::new(connector));
    server.set_tools(&[test_endpoint()]);

    let state = Arc::new(SseState::new(Arc::new(server), "", options));
    let app = sse::router(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{addr}"), state)
}

fn rpc(id: i64, method: &str, params: Value) -> Value {
    json!({"jsonrpc": "2.0", "id": id, "method": method, "params": params})
}

#[tokio::test]
async fn test_session_responds_in_arrival_order() {
    let (base, _state) = spawn_server(SseOptions::default()).await;
    let client = reqwest::Client::new();

    let response = client.get(format!("{base}/sse")).send().await.unwrap();
    assert_eq!(response.status(), 200);
    let mut reader = SseReader::new(response);

    let endpoint_frame = reader.next_frame().await;
    assert_eq!(endpoint_frame.event, "endpoint");
    let message_url = format!("{base}{}", endpoint_frame.data);
    assert!(endpoint_frame.data.contains("sessionId="));

    let post = client
        .post(&message_url)
        .json(&rpc(1, "initialize", json!({})))
        .send()
        .await
        .unwrap();
    assert_eq!(post.status(), 202);

    for id in [7, 8, 9] {
        let post = client
            .post(&message_url)
            .json(&rpc(id, "tools/list", json!({})))
            .send()
            .await
            .unwrap();
        assert_eq!(post.status(), 202);
    }

    let mut ids = Vec::new();
    for _ in 0..4 {
        let frame = reader.next_frame().await;
        assert_eq!(frame.event, "message");
        let response: Value = serde_json::from_str(&frame.data).unwrap();
        ids.push(response["id"].clone());
    }
    assert_eq!(ids, vec![json!(1), json!(7), json!(8), json!(9)]);
}

#[tokio::test]
async fn test_tool_call_over_sse() {
    let (base, _state) = spawn_server(SseOptions::default()).await;
    let client = reqwest::Client::new();

    let response = client.get(format!("{base}/sse")).send().await.unwrap();
    let mut reader = SseReader::new(response);
    let message_url = format!("{base}{}", reader.next_frame().await.data);

    client
        .post(&message_url)
        .json(&rpc(1, "initialize", json!({})))
        .send()
        .await
        .unwrap();
    client
        .post(&message_url)
        .json(&rpc(
            2,
            "tools/call",
            json!({"name": "echo_number", "arguments": {"n": 41}}),
        ))
        .send()
        .await
        .unwrap();

    reader.next_frame().await; // initialize response
    let frame = reader.next_frame().await;
    let response: Value = serde_json::from_str(&frame.data).unwrap();
    let text = response["result"]["content"][0]["text"].as_str().unwrap();
    let rows: Value = serde_json::from_str(text).unwrap();
    assert_eq!(rows, json!([{"n": 41}]));
}

#[tokio::test]
async fn test_unknown_session_is_404() {
    let (base, _state) = spawn_server(SseOptions::default()).await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{base}/message?sessionId=not-a-session"))
        .json(&rpc(1, "initialize", json!({})))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn test_shutdown_emits_terminal_event() {
    let (base, state) = spawn_server(SseOptions::default()).await;
    let client = reqwest::Client::new();

    let response = client.get(format!("{base}/sse")).send().await.unwrap();
    let mut reader = SseReader::new(response);
    reader.next_frame().await; // endpoint frame

    state.trigger_shutdown();

    let frame = reader.next_frame().await;
    assert_eq!(frame.event, "close");
}

#[tokio::test]
async fn test_session_is_released_when_stream_drops() {
    let (base, state) = spawn_server(SseOptions::default()).await;
    let client = reqwest::Client::new();

    let response = client.get(format!("{base}/sse")).send().await.unwrap();
    let mut reader = SseReader::new(response);
    reader.next_frame().await;
    assert_eq!(state.session_count(), 1);

    drop(reader);
    // the server notices the closed connection on its next write attempt
    tokio::time::timeout(Duration::from_secs(10), async {
        while state.session_count() != 0 {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    })
    .await
    .expect("session was not released after disconnect");
}
