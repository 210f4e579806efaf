//! The `mcp` command: serve the tool server over stdio.

use anyhow::Context;
use clap::{ArgAction, Args};
use sqlgate_mcp::McpServer;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Args, Debug)]
pub struct McpArgs {
    /// Path to the YAML gateway configuration.
    #[arg(long, default_value = "./gateway.yaml")]
    pub config: PathBuf,

    /// Database connection string (DSN) for a direct connection.
    #[arg(short = 'C', long = "connection-string")]
    pub connection_string: Option<String>,

    /// Backend type; inferred from the DSN scheme when absent.
    #[arg(long = "type")]
    pub backend: Option<String>,

    /// Enable raw protocol mode for AI agents.
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    pub raw: bool,

    /// Reject mutating statements.
    #[arg(long = "read-only", default_value_t = true, action = ArgAction::Set)]
    pub read_only: bool,
}

pub async fn run(args: McpArgs) -> anyhow::Result<()> {
    let config = super::resolve_config(
        &args.config,
        args.connection_string.as_deref(),
        args.backend.as_deref(),
        args.read_only,
    )?;

    let connector =
        sqlgate_connectors::registry::new_connector(&config.database.backend, &config.database.connection)
            .context("unable to init connector")?;
    connector
        .ping()
        .await
        .context("unable to reach the backend database")?;

    let mut server = McpServer::new(config.api.clone());
    server.set_connector(connector);
    if args.raw {
        server.enable_raw_protocol();
    }
    let endpoints = config.database.all_endpoints();
    if !endpoints.is_empty() {
        server.set_tools(&endpoints);
    }

    tracing::info!("MCP stdio transport ready");
    sqlgate_mcp::stdio::serve(Arc::new(server)).await?;
    Ok(())
}
