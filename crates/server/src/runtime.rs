//! Runs the gRPC and HTTP listeners side by side
//!
//! Both listeners share one shutdown broadcast. The collector stops when the
//! caller's shutdown future resolves or as soon as either listener exits,
//! and an exit that was not requested is returned as an error.

use crate::config::ServerConfig;
use crate::grpc::FleetReporterService;
use crate::http::{self, HttpState};
use anyhow::{Context, Result};
use fleet_lib::proto::AgentReporterServer;
use fleet_lib::store::RetentionStore;
use std::future::Future;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::task::JoinError;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::Server;
use tracing::{error, info};

type ListenerResult = std::result::Result<Result<()>, JoinError>;

/// Serve until `shutdown` resolves or a listener stops on its own
pub async fn run(
    config: &ServerConfig,
    service: FleetReporterService,
    store: RetentionStore,
    shutdown: impl Future<Output = ()>,
) -> Result<()> {
    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    let grpc_listener = TcpListener::bind(("0.0.0.0", config.grpc_port))
        .await
        .with_context(|| format!("Failed to bind gRPC port {}", config.grpc_port))?;
    info!(addr = ?grpc_listener.local_addr().ok(), "Starting gRPC server");

    let mut grpc_shutdown = shutdown_tx.subscribe();
    let mut grpc_handle = tokio::spawn(async move {
        Server::builder()
            .add_service(AgentReporterServer::new(service))
            .serve_with_incoming_shutdown(TcpListenerStream::new(grpc_listener), async move {
                let _ = grpc_shutdown.recv().await;
            })
            .await
            .context("gRPC transport failed")
    });

    let mut http_shutdown = shutdown_tx.subscribe();
    let mut http_handle = tokio::spawn(http::serve(
        config.http_port,
        HttpState::new(store),
        async move {
            let _ = http_shutdown.recv().await;
        },
    ));

    tokio::pin!(shutdown);
    let (grpc_exit, http_exit) = tokio::select! {
        _ = &mut shutdown => (None, None),
        result = &mut grpc_handle => (Some(result), None),
        result = &mut http_handle => (None, Some(result)),
    };
    let unrequested = grpc_exit.is_some() || http_exit.is_some();

    let _ = shutdown_tx.send(());

    let grpc = match grpc_exit {
        Some(result) => result,
        None => grpc_handle.await,
    };
    let http = match http_exit {
        Some(result) => result,
        None => http_handle.await,
    };

    let grpc = listener_outcome("gRPC", grpc);
    let http = listener_outcome("HTTP", http);
    grpc.and(http)?;

    if unrequested {
        anyhow::bail!("A listener stopped before shutdown was requested");
    }
    Ok(())
}

fn listener_outcome(name: &str, result: ListenerResult) -> Result<()> {
    match result {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => {
            error!(listener = name, error = %format!("{:#}", e), "Server failed");
            Err(e.context(format!("{} server failed", name)))
        }
        Err(e) => {
            error!(listener = name, error = %e, "Server task panicked");
            Err(anyhow::anyhow!("{} server task failed: {}", name, e))
        }
    }
}
