pub mod mcp;
pub mod start;

use anyhow::Context;
use sqlgate_core::GatewayConfig;
use std::path::Path;

/// Build the gateway config from a direct DSN or the YAML file.
///
/// With a DSN, the backend type defaults to the DSN scheme and a synthetic
/// endpoint-less config is produced; agents then work through raw mode.
pub(crate) fn resolve_config(
    config_path: &Path,
    connection_string: Option<&str>,
    backend: Option<&str>,
    read_only: bool,
) -> anyhow::Result<GatewayConfig> {
    if let Some(dsn) = connection_string {
        let backend = match backend {
            Some(backend) => backend.to_string(),
            None => {
                let scheme = dsn.split(':').next().unwrap_or_default();
                // both spellings of the Postgres scheme map to one registry key
                if scheme == "postgresql" {
                    "postgres".to_string()
                } else {
                    scheme.to_string()
                }
            }
        };
        let connection = serde_yaml::to_value(serde_yaml::Mapping::from_iter([
            (
                serde_yaml::Value::from("conn_string"),
                serde_yaml::Value::from(dsn),
            ),
            (
                serde_yaml::Value::from("is_readonly"),
                serde_yaml::Value::from(read_only),
            ),
        ]))?;

        let mut config = GatewayConfig::default();
        config.api.name = "Auto API".to_string();
        config.api.description = "Raw API for agent access".to_string();
        config.database.backend = backend;
        config.database.connection = connection;
        return Ok(config);
    }

    GatewayConfig::from_file(config_path)
        .with_context(|| format!("unable to load config {}", config_path.display()))
}

/// Wait for SIGINT or SIGTERM.
pub(crate) async fn wait_for_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "unable to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received SIGINT"),
        _ = terminate => tracing::info!("received SIGTERM"),
    }
}
