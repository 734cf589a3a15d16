//! Fleet agent
//!
//! Runs inside the cluster, collecting a snapshot of every namespace on a
//! fixed interval and delivering it to the central collector.

use anyhow::{Context, Result};
use fleet_lib::{
    cluster::KubeCluster,
    collector::CollectionLoopBuilder,
    delivery::DeliveryClient,
    health::HealthRegistry,
    observability::{FleetMetrics, StructuredLogger},
};
use fleet_agent::{api, config::AgentConfig};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const AGENT_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting fleet-agent");

    let config = AgentConfig::load()?;
    info!(
        node_name = %config.node_name,
        server_addr = %config.server_addr,
        interval_secs = config.collection_interval_secs,
        "Agent configured"
    );

    let health_registry = HealthRegistry::for_pipeline().await;
    let metrics = FleetMetrics::new();

    let logger = StructuredLogger::new(&config.node_name);
    logger.log_startup("agent", AGENT_VERSION);

    let cluster = KubeCluster::try_default()
        .await
        .context("Failed to create Kubernetes client")?;
    let delivery = DeliveryClient::new(config.delivery_config());

    let collection = CollectionLoopBuilder::new()
        .inventory(Arc::new(cluster))
        .delivery(Arc::new(delivery))
        .health(health_registry.clone())
        .interval(config.collection_interval())
        .source(config.node_name.clone())
        .build()?;

    let app_state = Arc::new(api::AppState::new(health_registry.clone(), metrics));
    let api_handle = tokio::spawn(api::serve(config.api_port, app_state));

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let collection_handle = tokio::spawn(collection.run(shutdown_rx));

    health_registry.set_ready(true);

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result.context("Failed to listen for shutdown signal")?;
            logger.log_shutdown("agent", "SIGINT received");
        }
        result = api_handle => {
            match result {
                Ok(Ok(())) => logger.log_shutdown("agent", "API server stopped"),
                Ok(Err(e)) => error!(error = %e, "API server failed"),
                Err(e) => error!(error = %e, "API server task panicked"),
            }
        }
    }

    health_registry.set_ready(false);
    let _ = shutdown_tx.send(());
    if let Err(e) = collection_handle.await {
        error!(error = %e, "Collection loop task failed");
    }

    info!("Shutdown complete");
    Ok(())
}
