//! HTTP read API over the retention store

use anyhow::Context;
use axum::{
    extract::State,
    http::{header, HeaderValue, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use fleet_lib::models::Snapshot;
use fleet_lib::observability::gather_metrics;
use fleet_lib::store::RetentionStore;
use serde_json::json;
use tracing::{error, info};

/// Shared application state
#[derive(Clone)]
pub struct HttpState {
    pub store: RetentionStore,
}

impl HttpState {
    pub fn new(store: RetentionStore) -> Self {
        Self { store }
    }
}

/// All retained snapshots, oldest first
async fn list_data(State(state): State<HttpState>) -> impl IntoResponse {
    let snapshots = state.store.all().await;
    let data: Vec<&Snapshot> = snapshots.iter().map(|s| s.as_ref()).collect();

    Json(json!({
        "data": data,
        "count": data.len(),
    }))
}

/// Most recent snapshot
async fn latest_data(State(state): State<HttpState>) -> Response {
    match state.store.latest().await {
        Some(snapshot) => Json(json!({ "data": snapshot.as_ref() })).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "No data available" })),
        )
            .into_response(),
    }
}

async fn health(State(state): State<HttpState>) -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "dataPoints": state.store.count().await,
    }))
}

/// Prometheus metrics endpoint
async fn metrics() -> Response {
    match gather_metrics() {
        Ok(text) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
            text,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Failed to encode metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// CORS preflight
async fn preflight() -> StatusCode {
    StatusCode::OK
}

async fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": "Not found" })),
    )
        .into_response()
}

async fn add_cors_headers(mut response: Response) -> Response {
    let headers = response.headers_mut();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type"),
    );
    response
}

/// Create the API router
pub fn create_router(state: HttpState) -> Router {
    Router::new()
        .route("/api/data", get(list_data).options(preflight))
        .route("/api/data/latest", get(latest_data).options(preflight))
        .route("/api/health", get(health).options(preflight))
        .route("/metrics", get(metrics))
        .fallback(not_found)
        .layer(middleware::map_response(add_cors_headers))
        .with_state(state)
}

/// Start the HTTP server, stopping when `shutdown` resolves
pub async fn serve(
    port: u16,
    state: HttpState,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting HTTP API server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind HTTP port {}", port))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}
