//! MCP (Model Context Protocol) server for sqlgate.
//!
//! Exposes the installed endpoints as callable tools over a JSON-RPC 2.0
//! state machine, delivered either over SSE (`GET /sse` + `POST /message`)
//! or newline-delimited stdio.

pub mod protocol;
pub mod server;
pub mod sse;
pub mod stdio;
pub mod tools;

pub use server::{McpServer, McpToolEnricher, SessionState, ToolHandler};
pub use sse::{SseOptions, SseState};
