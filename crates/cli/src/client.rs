//! Clients for the collector's HTTP read API and log streaming RPC

use anyhow::{Context, Result};
use fleet_lib::logtail::LogTailRequest;
use fleet_lib::models::Snapshot;
use fleet_lib::proto::{AgentReporterClient, LogRequest};
use reqwest::{Client, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tonic::Streaming;
use url::Url;

/// Client for the collector HTTP API
pub struct ApiClient {
    client: Client,
    base_url: Url,
}

impl ApiClient {
    /// Create a new API client
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        let base_url = Url::parse(base_url).context("Invalid API URL")?;

        Ok(Self { client, base_url })
    }

    /// GET `path`, returning `None` on 404
    async fn get_optional<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>> {
        let url = self.base_url.join(path).context("Invalid path")?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("Failed to send request")?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("API error ({}): {}", status, body);
        }

        response
            .json()
            .await
            .map(Some)
            .context("Failed to parse response")
    }

    /// Make a GET request
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.get_optional(path)
            .await?
            .with_context(|| format!("{} not found", path))
    }

    pub async fn health(&self) -> Result<CollectorHealth> {
        self.get("api/health").await
    }

    /// All retained snapshots, oldest first
    pub async fn snapshots(&self) -> Result<Vec<Snapshot>> {
        let list: SnapshotList = self.get("api/data").await?;
        Ok(list.data)
    }

    /// Most recent snapshot, `None` if the collector has none yet
    pub async fn latest(&self) -> Result<Option<Snapshot>> {
        let latest: Option<LatestSnapshot> = self.get_optional("api/data/latest").await?;
        Ok(latest.map(|l| l.data))
    }
}

/// Open a log stream against the collector's gRPC endpoint
pub async fn stream_logs(
    grpc_url: &str,
    request: &LogTailRequest,
) -> Result<Streaming<fleet_lib::proto::LogStream>> {
    let mut client = AgentReporterClient::connect(grpc_url.to_string())
        .await
        .with_context(|| format!("Failed to connect to {}", grpc_url))?;

    let response = client
        .stream_pod_logs(LogRequest::from(request))
        .await
        .context("Log stream request failed")?;

    Ok(response.into_inner())
}

// API response types

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectorHealth {
    pub status: String,
    #[serde(rename = "dataPoints")]
    pub data_points: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SnapshotList {
    pub data: Vec<Snapshot>,
    #[allow(dead_code)]
    pub count: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LatestSnapshot {
    pub data: Snapshot,
}
