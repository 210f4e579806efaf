//! The `start` command: serve REST and MCP SSE from one listener.

use anyhow::Context;
use clap::{ArgAction, Args};
use sqlgate_mcp::{McpServer, SseOptions, SseState};
use sqlgate_rest::{RestApi, RestOptions};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Args, Debug)]
pub struct StartArgs {
    /// Path to the YAML gateway configuration.
    #[arg(long, default_value = "./gateway.yaml")]
    pub config: PathBuf,

    /// Address and port to bind (e.g. ':9090', '127.0.0.1:8080').
    #[arg(long, default_value = ":9090")]
    pub addr: String,

    /// Database connection string (DSN) for a direct connection.
    #[arg(short = 'C', long = "connection-string")]
    pub connection_string: Option<String>,

    /// Backend type; inferred from the DSN scheme when absent.
    #[arg(long = "type")]
    pub backend: Option<String>,

    /// Comma-separated extra server URLs for the OpenAPI document.
    #[arg(long, default_value = "")]
    pub servers: String,

    /// URL prefix for all endpoints.
    #[arg(long, default_value = "")]
    pub prefix: String,

    /// Disable the Swagger UI page.
    #[arg(long, default_value_t = false)]
    pub disable_swagger: bool,

    /// Serve the MCP SSE endpoints.
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    pub mcp: bool,

    /// Serve the REST API endpoints.
    #[arg(long = "rest-api", default_value_t = true, action = ArgAction::Set)]
    pub rest_api: bool,

    /// Enable raw protocol mode for AI agents.
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    pub raw: bool,

    /// Reject mutating statements.
    #[arg(long = "read-only", default_value_t = true, action = ArgAction::Set)]
    pub read_only: bool,
}

pub async fn run(args: StartArgs) -> anyhow::Result<()> {
    if !args.rest_api && !args.mcp {
        anyhow::bail!("at least one of --rest-api and --mcp must be enabled");
    }

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

    let endpoints = config.database.all_endpoints();
    let rest = RestApi::new(&config, connector.clone(), &args.prefix)?;
    let prefix = rest.prefix().to_string();

    let servers = server_addresses(&args.servers, &args.addr);

    let mut app = axum::Router::new();

    if args.rest_api {
        let options = RestOptions {
            disable_swagger: args.disable_swagger,
            raw_mode: args.raw,
            servers: servers.clone(),
        };
        app = app.merge(rest.router(&options));
        if !args.disable_swagger {
            tracing::info!(url = %format!("{}{}/", servers[0], prefix), "REST API with Swagger UI");
        }
    }

    let sse_state = if args.mcp {
        let mut server = McpServer::new(config.api.clone());
        server.set_connector(connector.clone());
        if args.raw {
            server.enable_raw_protocol();
        }
        if !endpoints.is_empty() {
            server.set_tools(&endpoints);
        }

        let state = Arc::new(SseState::new(
            Arc::new(server),
            prefix.clone(),
            SseOptions::default(),
        ));
        app = app.merge(sqlgate_mcp::sse::router(state.clone()));
        tracing::info!(url = %format!("{}{}/sse", servers[0], prefix), "MCP SSE server for AI agents");
        Some(state)
    } else {
        None
    };

    app = app.layer(tower_http::catch_panic::CatchPanicLayer::new());

    let bind_addr = if args.addr.starts_with(':') {
        format!("0.0.0.0{}", args.addr)
    } else {
        args.addr.clone()
    };
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("unable to bind {bind_addr}"))?;

    tracing::info!(addr = %bind_addr, "gateway server started");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            super::wait_for_signal().await;
            if let Some(state) = sse_state {
                state.trigger_shutdown();
            }
        })
        .await
        .context("server error")?;

    tracing::info!("server shutdown complete");
    Ok(())
}

/// Advertised server URLs: the --servers list, or localhost on the bind addr.
fn server_addresses(servers: &str, addr: &str) -> Vec<String> {
    let mut out: Vec<String> = servers
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect();

    if out.is_empty() {
        if addr.starts_with(':') {
            out.push(format!("http://localhost{addr}"));
        } else {
            out.push(format!("http://{addr}"));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_addresses_from_flag() {
        let servers = server_addresses("https://a.example.com, https://b.example.com", ":9090");
        assert_eq!(servers, ["https://a.example.com", "https://b.example.com"]);
    }

    #[test]
    fn test_server_addresses_default_localhost() {
        assert_eq!(server_addresses("", ":9090"), ["http://localhost:9090"]);
        assert_eq!(server_addresses("", "10.0.0.5:8080"), ["http://10.0.0.5:8080"]);
    }
}
