//! sqlgate command line entry point.

mod commands;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "sqlgate", version, about = "Declarative SQL endpoints served as REST and MCP")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the gateway server (REST API and MCP SSE endpoints).
    Start(commands::start::StartArgs),

    /// Serve the MCP tool server over stdio (for desktop agent hosts).
    Mcp(commands::mcp::McpArgs),
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // stdout stays clean for the stdio transport
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    match cli.command {
        Command::Start(args) => commands::start::run(args).await,
        Command::Mcp(args) => commands::mcp::run(args).await,
    }
}
