//! Collection loop
//!
//! Drives one telemetry cycle per interval. Only one cycle runs at a time; a
//! tick that arrives while a cycle is still in flight is skipped, not queued.

use super::CycleReport;
use crate::aggregator::MetricsAggregator;
use crate::cluster::ClusterInventory;
use crate::delivery::SnapshotDelivery;
use crate::error::{ClusterError, CycleError};
use crate::health::{components, HealthRegistry};
use crate::models::{ResourceInfo, ResourceKind, ResourceMetric, Snapshot};
use crate::observability::{CycleOutcome, FleetMetrics, StructuredLogger};
use anyhow::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Configuration for the collection loop
#[derive(Debug, Clone)]
pub struct CollectionConfig {
    /// Interval between cycles (default: 30 seconds)
    pub interval: Duration,
    /// Name attached to log events, usually the node name
    pub source: String,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            source: "unknown".to_string(),
        }
    }
}

/// Clears the in-flight flag when dropped
#[derive(Debug)]
pub struct InFlightGuard {
    flag: Arc<AtomicBool>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Periodic snapshot collection and delivery
#[derive(Clone)]
pub struct CollectionLoop {
    inventory: Arc<dyn ClusterInventory>,
    aggregator: MetricsAggregator,
    delivery: Arc<dyn SnapshotDelivery>,
    health: HealthRegistry,
    config: CollectionConfig,
    in_flight: Arc<AtomicBool>,
    metrics: FleetMetrics,
    logger: StructuredLogger,
}

impl CollectionLoop {
    pub fn new(
        inventory: Arc<dyn ClusterInventory>,
        delivery: Arc<dyn SnapshotDelivery>,
        health: HealthRegistry,
        config: CollectionConfig,
    ) -> Self {
        let logger = StructuredLogger::new(config.source.clone());
        Self {
            aggregator: MetricsAggregator::new(inventory.clone()),
            inventory,
            delivery,
            health,
            config,
            in_flight: Arc::new(AtomicBool::new(false)),
            metrics: FleetMetrics::new(),
            logger,
        }
    }

    pub fn config(&self) -> &CollectionConfig {
        &self.config
    }

    /// Claim the single cycle slot, or `None` if a cycle is running
    pub fn try_begin(&self) -> Option<InFlightGuard> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlightGuard {
                flag: self.in_flight.clone(),
            })
    }

    pub fn is_running_cycle(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Run cycles until a shutdown signal arrives, then wait for the cycle
    /// in flight, if any, to finish
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        info!(
            interval_secs = self.config.interval.as_secs(),
            "Starting collection loop"
        );

        let mut ticker = interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut current: Option<JoinHandle<()>> = None;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.try_begin() {
                        Some(guard) => {
                            let cycle = self.clone();
                            current = Some(tokio::spawn(async move {
                                let _guard = guard;
                                // Outcomes are recorded inside run_cycle
                                let _ = cycle.run_cycle().await;
                            }));
                        }
                        None => {
                            self.metrics.inc_ticks_skipped();
                            self.logger.log_tick_skipped();
                        }
                    }
                }
                _ = shutdown.recv() => {
                    info!("Shutting down collection loop");
                    break;
                }
            }
        }

        if let Some(handle) = current.filter(|h| !h.is_finished()) {
            debug!("Waiting for in-flight cycle");
            if let Err(e) = handle.await {
                warn!(error = %e, "In-flight cycle panicked");
            }
        }
    }

    /// Collect a snapshot and deliver it, recording the outcome
    pub async fn run_cycle(&self) -> Result<CycleReport, CycleError> {
        let start = Instant::now();

        let (snapshot, mut report) = match self.collect_snapshot().await {
            Ok(collected) => collected,
            Err(e) => {
                self.metrics.observe_cycle(CycleOutcome::Aborted, start.elapsed());
                self.logger.log_cycle_aborted(&e.to_string());
                self.health
                    .record_failure(components::CLUSTER, e.to_string())
                    .await;
                return Err(e);
            }
        };
        self.health.record_success(components::CLUSTER).await;
        self.record_skips(&report).await;

        let delivery_start = Instant::now();
        let delivered = self.delivery.deliver(&snapshot).await;
        self.metrics
            .observe_delivery_latency(delivery_start.elapsed());
        report.elapsed = start.elapsed();

        match delivered {
            Ok(ack) => {
                debug!(message = %ack.message, "Collector acknowledged snapshot");
                self.health.record_success(components::DELIVERY).await;

                let outcome = if report.is_partial() {
                    CycleOutcome::Partial
                } else {
                    CycleOutcome::Complete
                };
                self.metrics.observe_cycle(outcome, report.elapsed);
                self.logger.log_cycle_completed(
                    report.namespaces_collected,
                    report.namespaces_total,
                    report.metrics,
                    report.elapsed,
                );
                Ok(report)
            }
            Err(failure) => {
                self.metrics.inc_delivery_failures(failure.reason());
                self.metrics
                    .observe_cycle(CycleOutcome::DeliveryFailed, report.elapsed);
                self.logger.log_delivery_failed(&failure.to_string());
                self.health
                    .record_failure(components::DELIVERY, failure.to_string())
                    .await;
                Err(CycleError::Delivery(failure))
            }
        }
    }

    /// Assemble a snapshot from every namespace that can be collected
    pub async fn collect_snapshot(&self) -> Result<(Snapshot, CycleReport), CycleError> {
        let start = Instant::now();

        let namespaces = self
            .inventory
            .list_namespaces()
            .await
            .map_err(CycleError::NamespaceEnumeration)?;

        let mut report = CycleReport {
            namespaces_total: namespaces.len(),
            ..CycleReport::default()
        };
        let mut resources = Vec::with_capacity(namespaces.len());
        let mut metrics = Vec::new();

        for namespace in namespaces {
            match self.collect_namespace(&namespace).await {
                Ok((info, ns_metrics)) => {
                    report.resources +=
                        info.pods.len() + info.deployments.len() + info.services.len();
                    report.metrics += ns_metrics.len();
                    resources.push(info);
                    metrics.extend(ns_metrics);
                }
                Err(e) => {
                    self.logger.log_namespace_skipped(&namespace, &e.to_string());
                    report.skipped.push((namespace, e.to_string()));
                }
            }
        }

        report.namespaces_collected = resources.len();
        report.elapsed = start.elapsed();

        let snapshot = Snapshot::new(resources, metrics, chrono::Utc::now().timestamp());
        Ok((snapshot, report))
    }

    /// Inventory and metrics for one namespace; any failure fails the namespace
    async fn collect_namespace(
        &self,
        namespace: &str,
    ) -> Result<(ResourceInfo, Vec<ResourceMetric>), ClusterError> {
        let pods = self
            .inventory
            .list_resources(namespace, ResourceKind::Pod)
            .await?;
        let deployments = self
            .inventory
            .list_resources(namespace, ResourceKind::Deployment)
            .await?;
        let services = self
            .inventory
            .list_resources(namespace, ResourceKind::Service)
            .await?;

        let metrics = self
            .aggregator
            .aggregate_namespace(namespace, &pods, &deployments)
            .await?;

        let info = ResourceInfo {
            namespace: namespace.to_string(),
            pods: pods.into_iter().map(|p| p.name).collect(),
            deployments: deployments.into_iter().map(|d| d.name).collect(),
            services: services.into_iter().map(|s| s.name).collect(),
        };

        Ok((info, metrics))
    }

    async fn record_skips(&self, report: &CycleReport) {
        if report.is_partial() {
            self.metrics.add_namespaces_skipped(report.skipped.len());
            self.health
                .set_degraded(
                    components::COLLECTOR,
                    format!(
                        "{} of {} namespaces skipped",
                        report.skipped.len(),
                        report.namespaces_total
                    ),
                )
                .await;
        } else {
            self.health.record_success(components::COLLECTOR).await;
        }
    }
}

/// Builder for creating the collection loop
pub struct CollectionLoopBuilder {
    inventory: Option<Arc<dyn ClusterInventory>>,
    delivery: Option<Arc<dyn SnapshotDelivery>>,
    health: Option<HealthRegistry>,
    config: CollectionConfig,
}

impl CollectionLoopBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self {
            inventory: None,
            delivery: None,
            health: None,
            config: CollectionConfig::default(),
        }
    }

    pub fn inventory(mut self, inventory: Arc<dyn ClusterInventory>) -> Self {
        self.inventory = Some(inventory);
        self
    }

    pub fn delivery(mut self, delivery: Arc<dyn SnapshotDelivery>) -> Self {
        self.delivery = Some(delivery);
        self
    }

    pub fn health(mut self, health: HealthRegistry) -> Self {
        self.health = Some(health);
        self
    }

    /// Set the collection interval
    pub fn interval(mut self, interval: Duration) -> Self {
        self.config.interval = interval;
        self
    }

    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.config.source = source.into();
        self
    }

    /// Build the collection loop
    pub fn build(self) -> Result<CollectionLoop> {
        let inventory = self
            .inventory
            .ok_or_else(|| anyhow::anyhow!("Cluster inventory is required"))?;
        let delivery = self
            .delivery
            .ok_or_else(|| anyhow::anyhow!("Snapshot delivery is required"))?;
        if self.config.interval.is_zero() {
            anyhow::bail!("Collection interval must be positive");
        }

        Ok(CollectionLoop::new(
            inventory,
            delivery,
            self.health.unwrap_or_default(),
            self.config,
        ))
    }
}

impl Default for CollectionLoopBuilder {
    fn default() -> Self {
        Self::new()
    }
}
