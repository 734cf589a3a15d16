//! Agent configuration

use anyhow::{Context, Result};
use fleet_lib::delivery::DeliveryConfig;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Agent configuration, read from `KUBEFLEET_*` environment variables
#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    /// Node name from Kubernetes downward API
    #[serde(default = "default_node_name")]
    pub node_name: String,

    /// Collector gRPC address
    #[serde(default = "default_server_addr")]
    pub server_addr: String,

    /// Seconds between collection cycles
    #[serde(default = "default_collection_interval")]
    pub collection_interval_secs: u64,

    /// Bound on one delivery call in seconds
    #[serde(default = "default_delivery_timeout")]
    pub delivery_timeout_secs: u64,

    /// API server port for health/metrics
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// CA certificate for a TLS collector endpoint
    #[serde(default)]
    pub ca_cert_path: Option<PathBuf>,
}

fn default_node_name() -> String {
    std::env::var("NODE_NAME").unwrap_or_else(|_| "unknown".to_string())
}

fn default_server_addr() -> String {
    "localhost:50051".to_string()
}

fn default_collection_interval() -> u64 {
    30
}

fn default_delivery_timeout() -> u64 {
    30
}

fn default_api_port() -> u16 {
    8080
}

impl AgentConfig {
    /// Load configuration from the environment
    pub fn load() -> Result<Self> {
        Self::from_source(config::Environment::with_prefix("KUBEFLEET").try_parsing(true))
    }

    pub fn from_source(source: config::Environment) -> Result<Self> {
        let config = config::Config::builder()
            .add_source(source)
            .build()
            .context("Failed to read agent configuration")?;

        let agent: AgentConfig = config
            .try_deserialize()
            .context("Invalid KUBEFLEET_* configuration")?;

        if agent.collection_interval_secs == 0 {
            anyhow::bail!("KUBEFLEET_COLLECTION_INTERVAL_SECS must be positive");
        }
        if agent.delivery_timeout_secs == 0 {
            anyhow::bail!("KUBEFLEET_DELIVERY_TIMEOUT_SECS must be positive");
        }

        Ok(agent)
    }

    pub fn collection_interval(&self) -> Duration {
        Duration::from_secs(self.collection_interval_secs)
    }

    pub fn delivery_config(&self) -> DeliveryConfig {
        DeliveryConfig {
            endpoint: self.server_addr.clone(),
            request_timeout: Duration::from_secs(self.delivery_timeout_secs),
            ca_cert_path: self.ca_cert_path.clone(),
            ..DeliveryConfig::default()
        }
    }
}
