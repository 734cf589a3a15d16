//! Fleet collector
//!
//! Accepts snapshots from agents over gRPC, keeps the most recent ones in
//! memory and serves them over a small HTTP API. Also tails container logs
//! on request when it has cluster access.

use anyhow::Result;
use fleet_lib::{
    cluster::{KubeCluster, LogSource},
    observability::StructuredLogger,
    store::RetentionStore,
};
use fleet_server::{config::ServerConfig, grpc::FleetReporterService};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    let config = ServerConfig::load()?;
    info!(
        grpc_port = config.grpc_port,
        http_port = config.http_port,
        retention_capacity = config.retention_capacity,
        "Collector configured"
    );

    let logger = StructuredLogger::new("collector");
    logger.log_startup("collector", SERVER_VERSION);

    let store = RetentionStore::new(config.retention_capacity);

    let logs: Option<Arc<dyn LogSource>> = match KubeCluster::try_default().await {
        Ok(cluster) => Some(Arc::new(cluster)),
        Err(e) => {
            warn!(error = %e, "No cluster access, log streaming disabled");
            None
        }
    };

    let service = FleetReporterService::new(store.clone(), logs, config.log_tail_config());

    let shutdown = async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => logger.log_shutdown("collector", "SIGINT received"),
            Err(e) => error!(error = %e, "Failed to listen for shutdown signal"),
        }
    };

    fleet_server::run(&config, service, store, shutdown).await?;

    info!("Shutdown complete");
    Ok(())
}
