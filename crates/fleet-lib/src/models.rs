//! Core data models for the telemetry pipeline

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use crate::error::ModelError;

/// Kinds of cluster resources the agent enumerates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ResourceKind {
    Pod,
    Deployment,
    Service,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 3] = [
        ResourceKind::Pod,
        ResourceKind::Deployment,
        ResourceKind::Service,
    ];

    /// Kubernetes kind name, also used on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Pod => "Pod",
            ResourceKind::Deployment => "Deployment",
            ResourceKind::Service => "Service",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pod" | "pods" => Ok(ResourceKind::Pod),
            "deployment" | "deployments" => Ok(ResourceKind::Deployment),
            "service" | "services" => Ok(ResourceKind::Service),
            _ => Err(ModelError::UnknownKind(s.to_string())),
        }
    }
}

/// Equality-based label selector (`matchLabels`)
pub type Selector = BTreeMap<String, String>;

/// A named resource returned by inventory enumeration
///
/// Deployments and services carry the selector used to match their pods.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceEntry {
    pub name: String,
    pub selector: Option<Selector>,
}

impl ResourceEntry {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            selector: None,
        }
    }

    pub fn with_selector(name: impl Into<String>, selector: Selector) -> Self {
        Self {
            name: name.into(),
            selector: Some(selector),
        }
    }
}

/// Raw usage of one container as reported by the metrics API
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContainerUsage {
    pub cpu_millicores: u64,
    pub memory_bytes: u64,
}

/// Raw usage sample for a pod, one entry per container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PodUsage {
    pub pod_name: String,
    pub containers: Vec<ContainerUsage>,
}

/// Resources observed in one namespace during a cycle
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceInfo {
    pub namespace: String,
    pub pods: BTreeSet<String>,
    pub deployments: BTreeSet<String>,
    #[serde(default)]
    pub services: BTreeSet<String>,
}

/// Normalized usage for a pod or deployment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceMetric {
    pub namespace: String,
    pub name: String,
    pub kind: ResourceKind,
    /// CPU usage in cores
    #[serde(rename = "cpu")]
    pub cpu_cores: f64,
    /// Memory usage in MiB
    #[serde(rename = "memory")]
    pub memory_mib: f64,
}

/// One telemetry payload produced by a collection cycle
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub resources: Vec<ResourceInfo>,
    pub metrics: Vec<ResourceMetric>,
    /// Unix seconds; zero until assigned
    pub timestamp: i64,
}

impl Snapshot {
    pub fn new(resources: Vec<ResourceInfo>, metrics: Vec<ResourceMetric>, timestamp: i64) -> Self {
        Self {
            resources,
            metrics,
            timestamp,
        }
    }

    pub fn namespaces(&self) -> impl Iterator<Item = &str> {
        self.resources.iter().map(|r| r.namespace.as_str())
    }
}

/// Severity assigned to a log line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Error,
    Warn,
    Debug,
    Info,
}

impl LogLevel {
    /// Classify a raw log line by keyword.
    ///
    /// ERROR/FATAL take priority over WARN, then DEBUG, then INFO. Lines with
    /// no keyword are INFO.
    pub fn classify(line: &str) -> Self {
        let line = line.trim().to_uppercase();

        if line.contains("ERROR") || line.contains("FATAL") {
            LogLevel::Error
        } else if line.contains("WARN") {
            LogLevel::Warn
        } else if line.contains("DEBUG") {
            LogLevel::Debug
        } else {
            LogLevel::Info
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "ERROR",
            LogLevel::Warn => "WARN",
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "ERROR" => Ok(LogLevel::Error),
            "WARN" | "WARNING" => Ok(LogLevel::Warn),
            "DEBUG" => Ok(LogLevel::Debug),
            "INFO" => Ok(LogLevel::Info),
            _ => Err(ModelError::UnknownLevel(s.to_string())),
        }
    }
}

/// A classified log line from one container
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    pub namespace: String,
    pub pod: String,
    pub container: String,
    pub line: String,
    pub timestamp: i64,
    pub level: LogLevel,
}
