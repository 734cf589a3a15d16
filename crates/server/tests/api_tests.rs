//! Integration tests for the collector HTTP API

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use fleet_lib::models::{ResourceInfo, ResourceKind, ResourceMetric, Snapshot};
use fleet_lib::store::RetentionStore;
use fleet_server::http::{create_router, HttpState};
use tower::ServiceExt;

fn setup_test_app(capacity: usize) -> (Router, RetentionStore) {
    let store = RetentionStore::new(capacity);
    let router = create_router(HttpState::new(store.clone()));
    (router, store)
}

fn snapshot(timestamp: i64) -> Snapshot {
    let mut info = ResourceInfo {
        namespace: "default".to_string(),
        ..Default::default()
    };
    info.pods.insert("web-1".to_string());
    info.deployments.insert("web".to_string());

    Snapshot::new(
        vec![info],
        vec![ResourceMetric {
            namespace: "default".to_string(),
            name: "web".to_string(),
            kind: ResourceKind::Deployment,
            cpu_cores: 0.3,
            memory_mib: 96.0,
        }],
        timestamp,
    )
}

async fn send(app: Router, method: Method, uri: &str) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
    let response = app
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let headers = response.headers().clone();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, headers, body.to_vec())
}

async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let (status, _, body) = send(app, Method::GET, uri).await;
    (status, serde_json::from_slice(&body).unwrap())
}

#[tokio::test]
async fn test_data_is_empty_initially() {
    let (app, _store) = setup_test_app(10);

    let (status, json) = get_json(app, "/api/data").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["count"], 0);
    assert_eq!(json["data"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_data_lists_snapshots_oldest_first() {
    let (app, store) = setup_test_app(10);
    store.append(snapshot(100)).await;
    store.append(snapshot(200)).await;

    let (status, json) = get_json(app, "/api/data").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["count"], 2);
    assert_eq!(json["data"][0]["timestamp"], 100);
    assert_eq!(json["data"][1]["timestamp"], 200);

    let metric = &json["data"][0]["metrics"][0];
    assert_eq!(metric["kind"], "Deployment");
    assert_eq!(metric["cpu"], 0.3);
    assert_eq!(metric["memory"], 96.0);
    assert_eq!(json["data"][0]["resources"][0]["pods"][0], "web-1");
}

#[tokio::test]
async fn test_data_respects_retention_capacity() {
    let (app, store) = setup_test_app(2);
    for ts in 1..=3 {
        store.append(snapshot(ts)).await;
    }

    let (_, json) = get_json(app, "/api/data").await;
    assert_eq!(json["count"], 2);
    assert_eq!(json["data"][0]["timestamp"], 2);
    assert_eq!(json["data"][1]["timestamp"], 3);
}

#[tokio::test]
async fn test_latest_returns_404_when_empty() {
    let (app, _store) = setup_test_app(10);

    let (status, json) = get_json(app, "/api/data/latest").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "No data available");
}

#[tokio::test]
async fn test_latest_returns_most_recent_snapshot() {
    let (app, store) = setup_test_app(10);
    store.append(snapshot(100)).await;
    store.append(snapshot(200)).await;

    let (status, json) = get_json(app, "/api/data/latest").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["timestamp"], 200);
}

#[tokio::test]
async fn test_health_reports_data_points() {
    let (app, store) = setup_test_app(10);
    store.append(snapshot(100)).await;

    let (status, json) = get_json(app, "/api/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["dataPoints"], 1);
}

#[tokio::test]
async fn test_cors_headers_on_responses() {
    let (app, _store) = setup_test_app(10);

    let (_, headers, _) = send(app, Method::GET, "/api/data").await;
    assert_eq!(headers["access-control-allow-origin"], "*");
    assert_eq!(headers["access-control-allow-methods"], "GET, OPTIONS");
    assert_eq!(headers["access-control-allow-headers"], "Content-Type");
}

#[tokio::test]
async fn test_preflight_is_answered() {
    let (app, _store) = setup_test_app(10);

    let (status, headers, _) = send(app, Method::OPTIONS, "/api/data/latest").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers["access-control-allow-origin"], "*");
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let (app, _store) = setup_test_app(10);

    let (status, headers, _) = send(app, Method::GET, "/metrics").await;
    assert_eq!(status, StatusCode::OK);
    assert!(headers["content-type"]
        .to_str()
        .unwrap()
        .starts_with("text/plain"));
}

#[tokio::test]
async fn test_unknown_route_returns_json_404() {
    let (app, _store) = setup_test_app(10);

    let (status, headers, body) = send(app, Method::GET, "/api/unknown").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(headers["access-control-allow-origin"], "*");

    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["error"], "Not found");
}
