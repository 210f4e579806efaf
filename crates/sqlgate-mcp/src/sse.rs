//! SSE transport for the MCP server.
//!
//! A session is an actor: `POST /message?sessionId=…` feeds its inbox, a
//! worker task handles requests strictly in arrival order, and the SSE
//! stream opened by `GET /sse` drains the outbox. The outbox is bounded;
//! a client that stops reading is dropped once the queue hits the
//! high-water mark.

use crate::protocol::{JsonRpcRequest, JsonRpcResponse};
use crate::server::{McpServer, SessionState};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::{mpsc, watch};

/// Transport tuning knobs.
#[derive(Debug, Clone)]
pub struct SseOptions {
    /// Maximum queued responses per session before the client is dropped.
    pub queue_high_water: usize,
}

impl Default for SseOptions {
    fn default() -> Self {
        Self {
            queue_high_water: 1024,
        }
    }
}

type SessionMap = Arc<RwLock<HashMap<String, mpsc::Sender<JsonRpcRequest>>>>;

/// Shared state of the SSE transport.
pub struct SseState {
    server: Arc<McpServer>,
    sessions: SessionMap,
    prefix: String,
    options: SseOptions,
    shutdown: watch::Sender<bool>,
}

impl SseState {
    pub fn new(server: Arc<McpServer>, prefix: impl Into<String>, options: SseOptions) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            server,
            sessions: Arc::new(RwLock::new(HashMap::new())),
            prefix: prefix.into(),
            options,
            shutdown,
        }
    }

    /// Close every SSE stream with a terminal event.
    pub fn trigger_shutdown(&self) {
        let _ = self.shutdown.send(true);
    }

    pub fn session_count(&self) -> usize {
        self.sessions.read().expect("session map poisoned").len()
    }
}

/// Routes for the MCP SSE surface: `GET {prefix}/sse`, `POST {prefix}/message`.
pub fn router(state: Arc<SseState>) -> Router {
    let prefix = state.prefix.clone();
    Router::new()
        .route(&format!("{prefix}/sse"), get(handle_sse))
        .route(&format!("{prefix}/message"), post(handle_message))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct MessageQuery {
    #[serde(rename = "sessionId")]
    session_id: Option<String>,
}

/// Removes the session entry when the SSE stream ends for any reason.
struct SessionGuard {
    id: String,
    sessions: SessionMap,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.sessions
            .write()
            .expect("session map poisoned")
            .remove(&self.id);
        tracing::debug!(session_id = %self.id, "SSE session closed");
    }
}

async fn handle_sse(State(state): State<Arc<SseState>>) -> impl IntoResponse {
    let session_id = uuid::Uuid::new_v4().to_string();
    let (inbox_tx, inbox_rx) = mpsc::channel::<JsonRpcRequest>(64);
    let (outbox_tx, mut outbox_rx) = mpsc::channel::<JsonRpcResponse>(state.options.queue_high_water);

    state
        .sessions
        .write()
        .expect("session map poisoned")
        .insert(session_id.clone(), inbox_tx);
    tracing::debug!(session_id = %session_id, "SSE session opened");

    tokio::spawn(run_session_worker(
        state.server.clone(),
        inbox_rx,
        outbox_tx,
        state.sessions.clone(),
        session_id.clone(),
    ));

    let message_url = format!("{}/message?sessionId={}", state.prefix, session_id);
    let mut shutdown = state.shutdown.subscribe();
    let guard = SessionGuard {
        id: session_id,
        sessions: state.sessions.clone(),
    };

    let stream = async_stream::stream! {
        let _guard = guard;
        yield Ok::<_, Infallible>(Event::default().event("endpoint").data(message_url));

        loop {
            let shutting_down = *shutdown.borrow();
            if shutting_down {
                yield Ok(Event::default().event("close").data("server shutting down"));
                break;
            }
            tokio::select! {
                response = outbox_rx.recv() => match response {
                    Some(response) => {
                        let data = serde_json::to_string(&response).unwrap_or_default();
                        yield Ok(Event::default().event("message").data(data));
                    }
                    None => break,
                },
                _ = shutdown.changed() => {
                    yield Ok(Event::default().event("close").data("server shutting down"));
                    break;
                }
            }
        }
    };

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(30))
            .text("ping"),
    )
}

/// Per-session actor loop: strict FIFO from inbox to outbox.
///
/// Responses are enqueued with `try_send`; a full outbox means the client
/// stopped draining, and the whole session is torn down rather than letting
/// the queue grow without bound.
pub(crate) async fn run_session_worker(
    server: Arc<McpServer>,
    mut inbox: mpsc::Receiver<JsonRpcRequest>,
    outbox: mpsc::Sender<JsonRpcResponse>,
    sessions: SessionMap,
    session_id: String,
) {
    let session = SessionState::new();
    while let Some(request) = inbox.recv().await {
        let Some(response) = server.handle_request(&session, request).await else {
            continue;
        };
        match outbox.try_send(response) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(
                    session_id = %session_id,
                    "slow client: outbound queue overflow, dropping session"
                );
                sessions
                    .write()
                    .expect("session map poisoned")
                    .remove(&session_id);
                break;
            }
            Err(mpsc::error::TrySendError::Closed(_)) => break,
        }
    }
}

async fn handle_message(
    State(state): State<Arc<SseState>>,
    Query(query): Query<MessageQuery>,
    Json(request): Json<JsonRpcRequest>,
) -> impl IntoResponse {
    let Some(session_id) = query.session_id else {
        return (StatusCode::BAD_REQUEST, "missing sessionId").into_response();
    };

    let inbox = {
        let sessions = state.sessions.read().expect("session map poisoned");
        sessions.get(&session_id).cloned()
    };
    let Some(inbox) = inbox else {
        return (StatusCode::NOT_FOUND, "unknown session").into_response();
    };

    // enqueue only; the response is delivered on the SSE stream in order
    if inbox.send(request).await.is_err() {
        return (StatusCode::NOT_FOUND, "session closed").into_response();
    }
    StatusCode::ACCEPTED.into_response()
}
