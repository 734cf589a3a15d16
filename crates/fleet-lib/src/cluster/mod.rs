//! Cluster capabilities consumed by the pipeline
//!
//! The collection loop, the aggregator and log sessions only see the cluster
//! through these traits. [`KubeCluster`] implements both against the
//! Kubernetes API; tests substitute in-memory fakes.

mod kubernetes;
mod quantity;

pub use kubernetes::KubeCluster;
pub use quantity::{parse_cpu_millicores, parse_memory_bytes};

use crate::error::ClusterError;
use crate::models::{PodUsage, ResourceEntry, ResourceKind, Selector};
use chrono::{DateTime, Utc};

pub use async_trait::async_trait;

/// Enumeration and usage queries against the cluster
#[async_trait]
pub trait ClusterInventory: Send + Sync {
    /// List all namespace names
    async fn list_namespaces(&self) -> Result<Vec<String>, ClusterError>;

    /// List resources of one kind in a namespace
    async fn list_resources(
        &self,
        namespace: &str,
        kind: ResourceKind,
    ) -> Result<Vec<ResourceEntry>, ClusterError>;

    /// Names of the pods in `namespace` whose labels match `selector`
    async fn pods_matching(
        &self,
        namespace: &str,
        selector: &Selector,
    ) -> Result<Vec<String>, ClusterError>;

    /// Current usage samples for the pods in a namespace
    async fn pod_usage(&self, namespace: &str) -> Result<Vec<PodUsage>, ClusterError>;
}

/// Container log access
#[async_trait]
pub trait LogSource: Send + Sync {
    /// Container names of a pod, in spec order
    async fn pod_containers(&self, namespace: &str, pod: &str) -> Result<Vec<String>, ClusterError>;

    /// The most recent lines of a container's log. `None` returns everything.
    async fn tail_logs(
        &self,
        namespace: &str,
        pod: &str,
        container: &str,
        tail_lines: Option<i64>,
    ) -> Result<Vec<String>, ClusterError>;

    /// Lines written at or after `since`
    async fn logs_since(
        &self,
        namespace: &str,
        pod: &str,
        container: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<String>, ClusterError>;
}

/// Render a selector in `key=value,key=value` form
pub fn format_selector(selector: &Selector) -> String {
    selector
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(",")
}
