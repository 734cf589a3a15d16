//! gRPC delivery client

use super::{Ack, SnapshotDelivery};
use crate::error::DeliveryFailure;
use crate::models::Snapshot;
use crate::proto::{AgentData, AgentReporterClient};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tonic::transport::{Certificate, Channel, ClientTlsConfig, Endpoint};
use tonic::Code;
use tracing::{debug, info, warn};

/// Default collector address
pub const DEFAULT_ENDPOINT: &str = "localhost:50051";

/// Configuration for the delivery client
#[derive(Debug, Clone)]
pub struct DeliveryConfig {
    /// Collector address, with or without scheme (e.g. "localhost:50051")
    pub endpoint: String,
    /// Bound on a whole delivery call, connection included
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
    pub keepalive_interval: Duration,
    /// CA certificate to verify the collector; plaintext when unset
    pub ca_cert_path: Option<PathBuf>,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            request_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            keepalive_interval: Duration::from_secs(30),
            ca_cert_path: None,
        }
    }
}

impl DeliveryConfig {
    /// Endpoint URL with a scheme
    pub fn endpoint_url(&self) -> String {
        if self.endpoint.contains("://") {
            self.endpoint.clone()
        } else if self.ca_cert_path.is_some() {
            format!("https://{}", self.endpoint)
        } else {
            format!("http://{}", self.endpoint)
        }
    }
}

#[derive(Debug, Clone, Default)]
struct ConnectionState {
    connected: bool,
    last_error: Option<String>,
    consecutive_failures: u32,
}

/// Delivers snapshots over the `AgentReporter.Deliver` RPC
#[derive(Clone)]
pub struct DeliveryClient {
    config: DeliveryConfig,
    channel: Arc<RwLock<Option<Channel>>>,
    state: Arc<RwLock<ConnectionState>>,
}

impl DeliveryClient {
    pub fn new(config: DeliveryConfig) -> Self {
        Self {
            config,
            channel: Arc::new(RwLock::new(None)),
            state: Arc::new(RwLock::new(ConnectionState::default())),
        }
    }

    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        Self::new(DeliveryConfig {
            endpoint: endpoint.into(),
            ..DeliveryConfig::default()
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.config.endpoint
    }

    pub fn request_timeout(&self) -> Duration {
        self.config.request_timeout
    }

    pub async fn is_connected(&self) -> bool {
        self.state.read().await.connected
    }

    /// (connected, consecutive failures, last error)
    pub async fn connection_stats(&self) -> (bool, u32, Option<String>) {
        let state = self.state.read().await;
        (
            state.connected,
            state.consecutive_failures,
            state.last_error.clone(),
        )
    }

    async fn tls_config(&self, url: &str) -> Result<Option<ClientTlsConfig>, DeliveryFailure> {
        let Some(path) = &self.config.ca_cert_path else {
            return Ok(None);
        };

        let pem = tokio::fs::read(path).await.map_err(|e| {
            DeliveryFailure::Endpoint(format!("failed to read CA certificate {:?}: {}", path, e))
        })?;

        let domain = url::Url::parse(url)
            .map_err(|e| DeliveryFailure::Endpoint(format!("{}: {}", url, e)))?
            .host_str()
            .map(str::to_string)
            .ok_or_else(|| DeliveryFailure::Endpoint(format!("no host in {}", url)))?;

        Ok(Some(
            ClientTlsConfig::new()
                .ca_certificate(Certificate::from_pem(pem))
                .domain_name(domain),
        ))
    }

    async fn create_channel(&self) -> Result<Channel, DeliveryFailure> {
        let url = self.config.endpoint_url();

        let mut endpoint = Endpoint::from_shared(url.clone())
            .map_err(|e| DeliveryFailure::Endpoint(format!("{}: {}", url, e)))?
            .connect_timeout(self.config.connect_timeout)
            .http2_keep_alive_interval(self.config.keepalive_interval)
            .keep_alive_while_idle(true);

        if let Some(tls) = self.tls_config(&url).await? {
            endpoint = endpoint
                .tls_config(tls)
                .map_err(|e| DeliveryFailure::Endpoint(e.to_string()))?;
        }

        endpoint
            .connect()
            .await
            .map_err(|e| DeliveryFailure::Transport(format!("failed to connect to {}: {}", url, e)))
    }

    /// Reuse the cached channel or open a new one
    async fn get_channel(&self) -> Result<Channel, DeliveryFailure> {
        if let Some(channel) = self.channel.read().await.as_ref() {
            return Ok(channel.clone());
        }

        let mut cached = self.channel.write().await;
        if let Some(channel) = cached.as_ref() {
            return Ok(channel.clone());
        }

        let channel = self.create_channel().await?;
        *cached = Some(channel.clone());

        info!(endpoint = %self.config.endpoint, "Connected to collector");
        Ok(channel)
    }

    async fn record_success(&self) {
        let mut state = self.state.write().await;
        state.connected = true;
        state.consecutive_failures = 0;
        state.last_error = None;
    }

    async fn record_failure(&self, failure: &DeliveryFailure) {
        let mut state = self.state.write().await;
        state.consecutive_failures += 1;
        state.last_error = Some(failure.to_string());

        // Rejections come from a healthy connection; anything else may have
        // broken the channel.
        if !matches!(failure, DeliveryFailure::Rejected(_)) {
            state.connected = false;
            *self.channel.write().await = None;
        }

        warn!(
            endpoint = %self.config.endpoint,
            error = %failure,
            failures = state.consecutive_failures,
            "Snapshot delivery failed"
        );
    }

    async fn send(&self, data: AgentData) -> Result<Ack, DeliveryFailure> {
        let channel = self.get_channel().await?;
        let mut client = AgentReporterClient::new(channel);

        let response = client
            .deliver(tonic::Request::new(data))
            .await
            .map_err(|status| match status.code() {
                Code::DeadlineExceeded => DeliveryFailure::Timeout(self.config.request_timeout),
                _ => DeliveryFailure::Transport(format!(
                    "{:?}: {}",
                    status.code(),
                    status.message()
                )),
            })?
            .into_inner();

        if response.success {
            Ok(Ack {
                message: response.message,
            })
        } else {
            Err(DeliveryFailure::Rejected(response.message))
        }
    }
}

#[async_trait]
impl SnapshotDelivery for DeliveryClient {
    async fn deliver(&self, snapshot: &Snapshot) -> Result<Ack, DeliveryFailure> {
        let data = AgentData::from(snapshot);
        let timeout = self.config.request_timeout;

        let result = match tokio::time::timeout(timeout, self.send(data)).await {
            Ok(result) => result,
            Err(_) => Err(DeliveryFailure::Timeout(timeout)),
        };

        match &result {
            Ok(ack) => {
                debug!(
                    endpoint = %self.config.endpoint,
                    message = %ack.message,
                    "Snapshot delivered"
                );
                self.record_success().await;
            }
            Err(failure) => self.record_failure(failure).await,
        }

        result
    }
}

/// Builder for [`DeliveryClient`]
pub struct DeliveryClientBuilder {
    config: DeliveryConfig,
}

impl DeliveryClientBuilder {
    pub fn new() -> Self {
        Self {
            config: DeliveryConfig::default(),
        }
    }

    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.endpoint = endpoint.into();
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    pub fn keepalive_interval(mut self, interval: Duration) -> Self {
        self.config.keepalive_interval = interval;
        self
    }

    pub fn ca_cert_path(mut self, path: Option<PathBuf>) -> Self {
        self.config.ca_cert_path = path;
        self
    }

    pub fn build(self) -> Result<DeliveryClient, DeliveryFailure> {
        let url = self.config.endpoint_url();
        url::Url::parse(&url).map_err(|e| DeliveryFailure::Endpoint(format!("{}: {}", url, e)))?;

        Ok(DeliveryClient::new(self.config))
    }
}

impl Default for DeliveryClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
