//! Kubernetes-backed cluster capabilities
//!
//! Uses the core and apps APIs for inventory, `metrics.k8s.io/v1beta1` for
//! pod usage and the pod log subresource for logs.

use super::{format_selector, parse_cpu_millicores, parse_memory_bytes, ClusterInventory, LogSource};
use crate::error::ClusterError;
use crate::models::{ContainerUsage, PodUsage, ResourceEntry, ResourceKind, Selector};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{Namespace, Pod, Service};
use kube::api::{Api, DynamicObject, ListParams, LogParams};
use kube::core::{ApiResource, GroupVersionKind};
use kube::{Client, ResourceExt};
use tracing::{debug, warn};

/// Cluster capabilities backed by a kube client
#[derive(Clone)]
pub struct KubeCluster {
    client: Client,
    pod_metrics: ApiResource,
}

impl KubeCluster {
    pub fn new(client: Client) -> Self {
        let gvk = GroupVersionKind::gvk("metrics.k8s.io", "v1beta1", "PodMetrics");
        Self {
            client,
            pod_metrics: ApiResource::from_gvk_with_plural(&gvk, "pods"),
        }
    }

    /// Connect using in-cluster configuration, falling back to kubeconfig
    pub async fn try_default() -> Result<Self, ClusterError> {
        let client = Client::try_default()
            .await
            .map_err(|e| ClusterError::Transport(e.to_string()))?;
        Ok(Self::new(client))
    }

    fn pods(&self, namespace: &str) -> Api<Pod> {
        Api::namespaced(self.client.clone(), namespace)
    }

    async fn read_logs(
        &self,
        namespace: &str,
        pod: &str,
        container: &str,
        params: LogParams,
    ) -> Result<Vec<String>, ClusterError> {
        let raw = self
            .pods(namespace)
            .logs(pod, &params)
            .await
            .map_err(|e| ClusterError::LogSource {
                pod: pod.to_string(),
                container: container.to_string(),
                message: e.to_string(),
            })?;

        Ok(raw.lines().map(str::to_string).collect())
    }
}

/// Parse one `PodMetrics` object into a usage sample
fn parse_pod_metrics(object: &DynamicObject) -> PodUsage {
    let containers = object
        .data
        .get("containers")
        .and_then(|c| c.as_array())
        .map(|containers| {
            containers
                .iter()
                .map(|container| {
                    let usage = container.get("usage");
                    let cpu = usage
                        .and_then(|u| u.get("cpu"))
                        .and_then(|q| q.as_str())
                        .and_then(parse_cpu_millicores);
                    let memory = usage
                        .and_then(|u| u.get("memory"))
                        .and_then(|q| q.as_str())
                        .and_then(parse_memory_bytes);

                    if cpu.is_none() || memory.is_none() {
                        debug!(pod = %object.name_any(), "Unparseable container usage, counting as zero");
                    }

                    ContainerUsage {
                        cpu_millicores: cpu.unwrap_or(0),
                        memory_bytes: memory.unwrap_or(0),
                    }
                })
                .collect()
        })
        .unwrap_or_default();

    PodUsage {
        pod_name: object.name_any(),
        containers,
    }
}

#[async_trait]
impl ClusterInventory for KubeCluster {
    async fn list_namespaces(&self) -> Result<Vec<String>, ClusterError> {
        let namespaces: Api<Namespace> = Api::all(self.client.clone());
        let list = namespaces
            .list(&ListParams::default())
            .await
            .map_err(|e| ClusterError::enumeration("namespaces", e))?;

        Ok(list.items.iter().map(|ns| ns.name_any()).collect())
    }

    async fn list_resources(
        &self,
        namespace: &str,
        kind: ResourceKind,
    ) -> Result<Vec<ResourceEntry>, ClusterError> {
        let what = || format!("{} in namespace {}", kind, namespace);
        let lp = ListParams::default();

        match kind {
            ResourceKind::Pod => {
                let list = self
                    .pods(namespace)
                    .list(&lp)
                    .await
                    .map_err(|e| ClusterError::enumeration(what(), e))?;
                Ok(list
                    .items
                    .iter()
                    .map(|p| ResourceEntry::named(p.name_any()))
                    .collect())
            }
            ResourceKind::Deployment => {
                let api: Api<Deployment> = Api::namespaced(self.client.clone(), namespace);
                let list = api
                    .list(&lp)
                    .await
                    .map_err(|e| ClusterError::enumeration(what(), e))?;
                Ok(list
                    .items
                    .iter()
                    .map(|d| {
                        let selector: Selector = d
                            .spec
                            .as_ref()
                            .and_then(|s| s.selector.match_labels.clone())
                            .unwrap_or_default();
                        ResourceEntry::with_selector(d.name_any(), selector)
                    })
                    .collect())
            }
            ResourceKind::Service => {
                let api: Api<Service> = Api::namespaced(self.client.clone(), namespace);
                let list = api
                    .list(&lp)
                    .await
                    .map_err(|e| ClusterError::enumeration(what(), e))?;
                Ok(list
                    .items
                    .iter()
                    .map(|s| match s.spec.as_ref().and_then(|spec| spec.selector.clone()) {
                        Some(selector) => ResourceEntry::with_selector(s.name_any(), selector),
                        None => ResourceEntry::named(s.name_any()),
                    })
                    .collect())
            }
        }
    }

    async fn pods_matching(
        &self,
        namespace: &str,
        selector: &Selector,
    ) -> Result<Vec<String>, ClusterError> {
        let lp = ListParams::default().labels(&format_selector(selector));
        let list = self.pods(namespace).list(&lp).await.map_err(|e| {
            ClusterError::enumeration(
                format!("pods matching {:?} in namespace {}", selector, namespace),
                e,
            )
        })?;

        Ok(list.items.iter().map(|p| p.name_any()).collect())
    }

    async fn pod_usage(&self, namespace: &str) -> Result<Vec<PodUsage>, ClusterError> {
        let api: Api<DynamicObject> =
            Api::namespaced_with(self.client.clone(), namespace, &self.pod_metrics);
        let list = api
            .list(&ListParams::default())
            .await
            .map_err(|e| ClusterError::UsageQuery {
                namespace: namespace.to_string(),
                message: e.to_string(),
            })?;

        Ok(list.items.iter().map(parse_pod_metrics).collect())
    }
}

#[async_trait]
impl LogSource for KubeCluster {
    async fn pod_containers(&self, namespace: &str, pod: &str) -> Result<Vec<String>, ClusterError> {
        let pod_obj = self.pods(namespace).get(pod).await.map_err(|e| {
            ClusterError::enumeration(format!("pod {} in namespace {}", pod, namespace), e)
        })?;

        Ok(pod_obj
            .spec
            .map(|spec| spec.containers.into_iter().map(|c| c.name).collect())
            .unwrap_or_default())
    }

    async fn tail_logs(
        &self,
        namespace: &str,
        pod: &str,
        container: &str,
        tail_lines: Option<i64>,
    ) -> Result<Vec<String>, ClusterError> {
        let params = LogParams {
            container: Some(container.to_string()),
            tail_lines,
            ..LogParams::default()
        };
        self.read_logs(namespace, pod, container, params).await
    }

    async fn logs_since(
        &self,
        namespace: &str,
        pod: &str,
        container: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<String>, ClusterError> {
        // The log API takes a relative window in whole seconds; round up so the
        // window always covers the cursor.
        let elapsed = Utc::now().signed_duration_since(since);
        let mut since_seconds = elapsed.num_seconds();
        if elapsed.num_milliseconds() % 1000 != 0 {
            since_seconds += 1;
        }
        if since_seconds < 1 {
            warn!(%since, "Log cursor is in the future, querying the last second");
            since_seconds = 1;
        }

        let params = LogParams {
            container: Some(container.to_string()),
            since_seconds: Some(since_seconds),
            ..LogParams::default()
        };
        self.read_logs(namespace, pod, container, params).await
    }
}
