//! Collector configuration

use anyhow::{Context, Result};
use fleet_lib::logtail::LogTailConfig;
use fleet_lib::store::DEFAULT_CAPACITY;
use serde::Deserialize;
use std::time::Duration;

/// Collector configuration, read from unprefixed environment variables
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// `GRPC_PORT`
    #[serde(default = "default_grpc_port")]
    pub grpc_port: u16,

    /// `HTTP_PORT`
    #[serde(default = "default_http_port")]
    pub http_port: u16,

    /// `RETENTION_CAPACITY`
    #[serde(default = "default_retention_capacity")]
    pub retention_capacity: usize,

    /// `LOG_POLL_INTERVAL_SECS`
    #[serde(default = "default_log_poll_interval")]
    pub log_poll_interval_secs: u64,
}

fn default_grpc_port() -> u16 {
    50051
}

fn default_http_port() -> u16 {
    3000
}

fn default_retention_capacity() -> usize {
    DEFAULT_CAPACITY
}

fn default_log_poll_interval() -> u64 {
    5
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            grpc_port: default_grpc_port(),
            http_port: default_http_port(),
            retention_capacity: default_retention_capacity(),
            log_poll_interval_secs: default_log_poll_interval(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from the environment
    pub fn load() -> Result<Self> {
        Self::from_source(config::Environment::default().try_parsing(true))
    }

    pub fn from_source(source: config::Environment) -> Result<Self> {
        let config = config::Config::builder()
            .add_source(source)
            .build()
            .context("Failed to read collector configuration")?;

        let server: ServerConfig = config
            .try_deserialize()
            .context("Invalid collector configuration")?;

        if server.retention_capacity == 0 {
            anyhow::bail!("RETENTION_CAPACITY must be at least 1");
        }
        if server.log_poll_interval_secs == 0 {
            anyhow::bail!("LOG_POLL_INTERVAL_SECS must be positive");
        }

        Ok(server)
    }

    pub fn log_tail_config(&self) -> LogTailConfig {
        LogTailConfig {
            poll_interval: Duration::from_secs(self.log_poll_interval_secs),
        }
    }
}
