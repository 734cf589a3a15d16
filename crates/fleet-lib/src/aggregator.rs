//! Per-entity metric aggregation
//!
//! Maps raw per-pod usage samples onto pod and deployment metric records.
//! Pods are summed over their containers; deployments are summed over the
//! pods their selector matches at aggregation time.

use crate::cluster::ClusterInventory;
use crate::error::ClusterError;
use crate::models::{PodUsage, ResourceEntry, ResourceKind, ResourceMetric};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

const MILLICORES_PER_CORE: f64 = 1000.0;
const BYTES_PER_MIB: f64 = 1024.0 * 1024.0;

/// Normalized usage of one pod
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PodTotals {
    pub cpu_cores: f64,
    pub memory_mib: f64,
}

/// Sum container usage per pod and convert to cores and MiB.
///
/// Integer totals are converted once so that a pod's value does not depend
/// on container order.
pub fn fold_usage(samples: &[PodUsage]) -> HashMap<String, PodTotals> {
    samples
        .iter()
        .map(|sample| {
            let (millicores, bytes) = sample
                .containers
                .iter()
                .fold((0u64, 0u64), |(cpu, mem), c| {
                    (
                        cpu.saturating_add(c.cpu_millicores),
                        mem.saturating_add(c.memory_bytes),
                    )
                });

            (
                sample.pod_name.clone(),
                PodTotals {
                    cpu_cores: millicores as f64 / MILLICORES_PER_CORE,
                    memory_mib: bytes as f64 / BYTES_PER_MIB,
                },
            )
        })
        .collect()
}

/// Builds the metric records for a namespace
#[derive(Clone)]
pub struct MetricsAggregator {
    inventory: Arc<dyn ClusterInventory>,
}

impl MetricsAggregator {
    pub fn new(inventory: Arc<dyn ClusterInventory>) -> Self {
        Self { inventory }
    }

    /// Produce one metric per pod, then one per deployment, in inventory order.
    ///
    /// Pods without a usage sample report zeros. Any failure to query usage or
    /// resolve a deployment selector fails the whole namespace.
    pub async fn aggregate_namespace(
        &self,
        namespace: &str,
        pods: &[ResourceEntry],
        deployments: &[ResourceEntry],
    ) -> Result<Vec<ResourceMetric>, ClusterError> {
        let samples = self.inventory.pod_usage(namespace).await?;
        let totals = fold_usage(&samples);

        let mut metrics = Vec::with_capacity(pods.len() + deployments.len());

        for pod in pods {
            let usage = totals.get(&pod.name).copied().unwrap_or_default();
            metrics.push(ResourceMetric {
                namespace: namespace.to_string(),
                name: pod.name.clone(),
                kind: ResourceKind::Pod,
                cpu_cores: usage.cpu_cores,
                memory_mib: usage.memory_mib,
            });
        }

        for deployment in deployments {
            let matched = match &deployment.selector {
                Some(selector) if !selector.is_empty() => {
                    self.inventory.pods_matching(namespace, selector).await?
                }
                // An empty selector would match every pod in the namespace
                _ => {
                    debug!(
                        namespace = %namespace,
                        deployment = %deployment.name,
                        "Deployment has no label selector"
                    );
                    Vec::new()
                }
            };

            let sum = matched
                .iter()
                .filter_map(|name| totals.get(name))
                .fold(PodTotals::default(), |acc, t| PodTotals {
                    cpu_cores: acc.cpu_cores + t.cpu_cores,
                    memory_mib: acc.memory_mib + t.memory_mib,
                });

            metrics.push(ResourceMetric {
                namespace: namespace.to_string(),
                name: deployment.name.clone(),
                kind: ResourceKind::Deployment,
                cpu_cores: sum.cpu_cores,
                memory_mib: sum.memory_mib,
            });
        }

        Ok(metrics)
    }
}
