//! Pipeline health behind the agent's `/healthz` and `/readyz`
//!
//! Components report outcomes, not statuses. A failure degrades the
//! component; a run of consecutive failures marks it unhealthy, and the next
//! success clears it.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::warn;

/// Consecutive failures after which a component is unhealthy
pub const DEFAULT_UNHEALTHY_AFTER: u32 = 3;

/// Component names reported by the collection loop
pub mod components {
    /// Namespace listing against the cluster API
    pub const CLUSTER: &str = "cluster";
    /// Per-namespace collection; only ever degraded by skipped namespaces
    pub const COLLECTOR: &str = "collector";
    /// Snapshot delivery to the collector
    pub const DELIVERY: &str = "delivery";

    pub const ALL: [&str; 3] = [CLUSTER, COLLECTOR, DELIVERY];
}

/// Ordered by severity, so the overall status is the worst component's
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: ComponentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Failures since the last success
    #[serde(default)]
    pub consecutive_failures: u32,
    pub last_check_timestamp: i64,
}

impl ComponentHealth {
    fn ok() -> Self {
        Self {
            status: ComponentStatus::Healthy,
            message: None,
            consecutive_failures: 0,
            last_check_timestamp: chrono::Utc::now().timestamp(),
        }
    }
}

/// Body of `/healthz`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: ComponentStatus,
    pub components: BTreeMap<String, ComponentHealth>,
}

/// Body of `/readyz`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Shared view of the pipeline's health
#[derive(Debug, Clone)]
pub struct HealthRegistry {
    components: Arc<RwLock<BTreeMap<String, ComponentHealth>>>,
    started: Arc<AtomicBool>,
    unhealthy_after: u32,
}

impl Default for HealthRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthRegistry {
    pub fn new() -> Self {
        Self::with_threshold(DEFAULT_UNHEALTHY_AFTER)
    }

    /// Registry that marks a component unhealthy after `unhealthy_after`
    /// consecutive failures (at least one)
    pub fn with_threshold(unhealthy_after: u32) -> Self {
        Self {
            components: Arc::new(RwLock::new(BTreeMap::new())),
            started: Arc::new(AtomicBool::new(false)),
            unhealthy_after: unhealthy_after.max(1),
        }
    }

    /// Registry with every pipeline component registered as healthy
    pub async fn for_pipeline() -> Self {
        let registry = Self::new();
        let mut map = registry.components.write().await;
        for name in components::ALL {
            map.insert(name.to_string(), ComponentHealth::ok());
        }
        drop(map);
        registry
    }

    /// The component worked; clears any failure streak
    pub async fn record_success(&self, name: &str) {
        self.components
            .write()
            .await
            .insert(name.to_string(), ComponentHealth::ok());
    }

    /// The component failed; returns its status after counting the failure
    pub async fn record_failure(&self, name: &str, message: impl Into<String>) -> ComponentStatus {
        let mut map = self.components.write().await;
        let entry = map.entry(name.to_string()).or_insert_with(ComponentHealth::ok);

        let was_unhealthy = entry.status == ComponentStatus::Unhealthy;
        entry.consecutive_failures = entry.consecutive_failures.saturating_add(1);
        entry.message = Some(message.into());
        entry.last_check_timestamp = chrono::Utc::now().timestamp();
        entry.status = if entry.consecutive_failures >= self.unhealthy_after {
            ComponentStatus::Unhealthy
        } else {
            ComponentStatus::Degraded
        };

        if entry.status == ComponentStatus::Unhealthy && !was_unhealthy {
            warn!(
                component = %name,
                failures = entry.consecutive_failures,
                "Component marked unhealthy"
            );
        }
        entry.status
    }

    /// Degraded without counting toward unhealthy, for conditions the
    /// component works around (a skipped namespace)
    pub async fn set_degraded(&self, name: &str, message: impl Into<String>) {
        let mut map = self.components.write().await;
        map.insert(
            name.to_string(),
            ComponentHealth {
                status: ComponentStatus::Degraded,
                message: Some(message.into()),
                consecutive_failures: 0,
                last_check_timestamp: chrono::Utc::now().timestamp(),
            },
        );
    }

    /// Flips once the collection loop is running, and back on shutdown
    pub fn set_ready(&self, ready: bool) {
        self.started.store(ready, Ordering::Release);
    }

    pub async fn health(&self) -> HealthResponse {
        let components = self.components.read().await.clone();
        let status = components
            .values()
            .map(|c| c.status)
            .max()
            .unwrap_or(ComponentStatus::Healthy);
        HealthResponse { status, components }
    }

    /// Ready while the loop runs and no component is unhealthy
    pub async fn readiness(&self) -> ReadinessResponse {
        if !self.started.load(Ordering::Acquire) {
            return ReadinessResponse {
                ready: false,
                reason: Some("collection loop not running".to_string()),
            };
        }

        let map = self.components.read().await;
        let unhealthy: Vec<String> = map
            .iter()
            .filter(|(_, c)| c.status == ComponentStatus::Unhealthy)
            .map(|(name, c)| match &c.message {
                Some(message) => format!("{}: {}", name, message),
                None => name.clone(),
            })
            .collect();

        if unhealthy.is_empty() {
            ReadinessResponse {
                ready: true,
                reason: None,
            }
        } else {
            ReadinessResponse {
                ready: false,
                reason: Some(format!("unhealthy: {}", unhealthy.join("; "))),
            }
        }
    }
}
