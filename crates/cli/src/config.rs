//! Configuration management for the CLI

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_API_URL: &str = "http://localhost:3000";
pub const DEFAULT_GRPC_URL: &str = "http://localhost:50051";

/// CLI configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Collector HTTP API URL
    pub api_url: Option<String>,
    /// Collector gRPC URL, used for log streaming
    pub grpc_url: Option<String>,
    /// Namespace used by `top` when none is given
    pub default_namespace: Option<String>,
}

impl Config {
    /// Load configuration from `~/.config/fleetctl/config.json`
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from a file; a missing file gives the defaults
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).context("Failed to read config file")?;

        serde_json::from_str(&content).context("Failed to parse config file")
    }

    /// Get the configuration file path
    fn config_path() -> Result<PathBuf> {
        let home = dirs_next::home_dir().context("Could not determine home directory")?;
        Ok(home.join(".config").join("fleetctl").join("config.json"))
    }

    /// Flag or environment value, then config file, then the built-in default
    pub fn api_url(&self, flag: Option<String>) -> String {
        flag.or_else(|| self.api_url.clone())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string())
    }

    pub fn grpc_url(&self, flag: Option<String>) -> String {
        flag.or_else(|| self.grpc_url.clone())
            .unwrap_or_else(|| DEFAULT_GRPC_URL.to_string())
    }

    pub fn namespace(&self, flag: Option<String>) -> Option<String> {
        flag.or_else(|| self.default_namespace.clone())
    }
}
