//! Tests for running both collector listeners together

use fleet_lib::logtail::LogTailConfig;
use fleet_lib::store::RetentionStore;
use fleet_server::config::ServerConfig;
use fleet_server::grpc::FleetReporterService;
use std::time::Duration;

fn config(grpc_port: u16, http_port: u16) -> ServerConfig {
    ServerConfig {
        grpc_port,
        http_port,
        ..Default::default()
    }
}

fn service(store: &RetentionStore) -> FleetReporterService {
    FleetReporterService::new(store.clone(), None, LogTailConfig::default())
}

#[tokio::test]
async fn test_run_fails_when_http_listener_cannot_start() {
    // Hold the port for the whole test
    let taken = std::net::TcpListener::bind("0.0.0.0:0").unwrap();
    let port = taken.local_addr().unwrap().port();

    let store = RetentionStore::new(10);
    let result = tokio::time::timeout(
        Duration::from_secs(5),
        fleet_server::run(&config(0, port), service(&store), store.clone(), std::future::pending()),
    )
    .await
    .expect("run should return once a listener fails");

    let err = result.unwrap_err();
    assert!(err.to_string().contains("HTTP"), "unexpected error: {err:#}");
}

#[tokio::test]
async fn test_run_fails_when_grpc_port_is_taken() {
    let taken = std::net::TcpListener::bind("0.0.0.0:0").unwrap();
    let port = taken.local_addr().unwrap().port();

    let store = RetentionStore::new(10);
    let result = tokio::time::timeout(
        Duration::from_secs(5),
        fleet_server::run(&config(port, 0), service(&store), store.clone(), std::future::pending()),
    )
    .await
    .expect("run should return when the gRPC port is taken");

    assert!(result.is_err());
}

#[tokio::test]
async fn test_run_stops_cleanly_on_shutdown() {
    let store = RetentionStore::new(10);
    let (tx, rx) = tokio::sync::oneshot::channel::<()>();

    let handle = tokio::spawn({
        let store = store.clone();
        async move {
            fleet_server::run(&config(0, 0), service(&store), store.clone(), async {
                let _ = rx.await;
            })
            .await
        }
    });

    tokio::time::sleep(Duration::from_millis(50)).await;
    tx.send(()).unwrap();

    let result = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("run should return after shutdown")
        .unwrap();
    assert!(result.is_ok());
}
