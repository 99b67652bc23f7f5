//! dbguard - Main Entry Point
//! Resilient query executor served over JSON-RPC

mod telemetry;

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

// Import workspace crates
use dbguard_api_rpc::{RpcServer, RpcServerConfig};
use dbguard_core::application::{cancel_channel, ConnectionPool, PoolReaper, QueryExecutor};
use dbguard_core::Settings;
use dbguard_infra_sqlite::SqliteConnector;

const VERSION: &str = env!("CARGO_PKG_VERSION");
const REAPER_STOP_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Load configuration (DBGUARD_* environment)
    let settings = Settings::from_env()?;

    // 2. Initialize logging
    let (otel_layer, otel_error) = match telemetry::layer() {
        Ok(layer) => (layer, None),
        Err(e) => (None, Some(e)),
    };

    let env_filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("dbguard=info"))?;

    match settings.log_format.as_str() {
        "json" => {
            // Production: JSON structured logging
            tracing_subscriber::registry()
                .with(otel_layer)
                .with(env_filter)
                .with(fmt::layer().json())
                .init();
        }
        _ => {
            // Development: Pretty formatting with colors
            tracing_subscriber::registry()
                .with(otel_layer)
                .with(env_filter)
                .with(fmt::layer().pretty())
                .init();
        }
    }

    info!("dbguard v{} starting...", VERSION);

    if let Some(e) = otel_error {
        warn!(error = %e, "OpenTelemetry not initialized (continuing without it)");
    }

    // 3. Build the pool
    let database_url = expand_database_url(&settings.database_url)?;
    info!(
        database_url = %database_url,
        environment = %settings.environment,
        "Initializing connection pool..."
    );

    let connector = SqliteConnector::new(&database_url)
        .map_err(|e| anyhow::anyhow!("Invalid database configuration: {}", e.detail()))?;
    let pool = ConnectionPool::new(Arc::new(connector), settings.pool_config());
    pool.warm_up().await;

    // 4. Executor + startup health check
    let executor = QueryExecutor::new(pool.clone(), settings.executor_config());
    if executor.test_connection().await {
        info!("Database reachable");
    } else {
        warn!("Database not reachable at startup; requests will retry until it is");
    }

    // 5. Start the idle reaper
    let (reaper_stop, reaper_token) = cancel_channel();
    let reaper = PoolReaper::new(pool.clone());
    let reaper_handle = tokio::spawn(reaper.run(reaper_token));

    // 6. Start JSON-RPC server
    info!("Starting JSON-RPC server...");
    let rpc_config = RpcServerConfig {
        host: settings.rpc_host.clone(),
        port: settings.rpc_port,
    };
    let rpc_handle = RpcServer::new(rpc_config, executor.clone())
        .start()
        .await
        .map_err(|e| anyhow::anyhow!("RPC server start failed: {}", e))?;

    info!(addr = %settings.rpc_addr(), "System ready");
    info!("Press Ctrl+C to shutdown");

    // 7. Wait for shutdown signal
    tokio::signal::ctrl_c().await?;

    info!("Shutdown signal received. Draining...");

    // 8. Graceful shutdown: stop intake, stop the reaper, drain the pool
    rpc_handle
        .stop()
        .map_err(|e| anyhow::anyhow!("RPC server stop failed: {}", e))?;
    rpc_handle.stopped().await;

    reaper_stop.cancel();
    let _ = tokio::time::timeout(REAPER_STOP_TIMEOUT, reaper_handle).await;

    let abandoned = executor.drain_and_close().await;
    if abandoned > 0 {
        warn!(abandoned = abandoned, "Connections still checked out at exit");
    }

    telemetry::shutdown();
    info!("Shutdown complete.");

    Ok(())
}

/// Expand `~` in file-backed SQLite URLs and create the parent directory
fn expand_database_url(url: &str) -> Result<String> {
    let Some(rest) = url.strip_prefix("sqlite://") else {
        return Ok(url.to_string());
    };

    let expanded = shellexpand::tilde(rest).into_owned();
    let path = expanded.split('?').next().unwrap_or_default();
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    Ok(format!("sqlite://{}", expanded))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_url_untouched() {
        assert_eq!(
            expand_database_url("sqlite::memory:").unwrap(),
            "sqlite::memory:"
        );
    }

    #[test]
    fn test_file_url_creates_parent_dir() {
        let dir = std::env::temp_dir().join(format!("dbguard-url-{}", std::process::id()));
        let url = format!("sqlite://{}/nested/data.db?mode=rwc", dir.display());

        let expanded = expand_database_url(&url).unwrap();
        assert_eq!(expanded, url);
        assert!(dir.join("nested").is_dir());

        let _ = std::fs::remove_dir_all(&dir);
    }
}
