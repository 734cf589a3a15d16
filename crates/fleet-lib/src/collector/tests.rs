//! Collection loop tests against in-memory cluster and delivery fakes

use super::*;
use crate::cluster::ClusterInventory;
use crate::delivery::{Ack, SnapshotDelivery};
use crate::error::{ClusterError, CycleError, DeliveryFailure};
use crate::health::{components, ComponentStatus, HealthRegistry, DEFAULT_UNHEALTHY_AFTER};
use crate::models::{
    ContainerUsage, PodUsage, ResourceEntry, ResourceKind, Selector, Snapshot,
};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio_test::assert_ok;

/// Cluster with the same workload in every namespace
struct MockInventory {
    namespaces: Vec<String>,
    failing_namespaces: HashSet<String>,
    failing_selector_namespaces: HashSet<String>,
    fail_namespace_listing: AtomicBool,
    list_delay: Duration,
    list_calls: AtomicUsize,
}

impl MockInventory {
    fn new(namespaces: &[&str]) -> Self {
        Self {
            namespaces: namespaces.iter().map(|s| s.to_string()).collect(),
            failing_namespaces: HashSet::new(),
            failing_selector_namespaces: HashSet::new(),
            fail_namespace_listing: AtomicBool::new(false),
            list_delay: Duration::ZERO,
            list_calls: AtomicUsize::new(0),
        }
    }

    fn failing(mut self, namespace: &str) -> Self {
        self.failing_namespaces.insert(namespace.to_string());
        self
    }

    /// Listing succeeds in `namespace` but label selectors cannot be resolved
    fn failing_selectors(mut self, namespace: &str) -> Self {
        self.failing_selector_namespaces.insert(namespace.to_string());
        self
    }
}

fn web_selector() -> Selector {
    let mut selector = Selector::new();
    selector.insert("app".to_string(), "web".to_string());
    selector
}

#[async_trait]
impl ClusterInventory for MockInventory {
    async fn list_namespaces(&self) -> Result<Vec<String>, ClusterError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if !self.list_delay.is_zero() {
            tokio::time::sleep(self.list_delay).await;
        }
        if self.fail_namespace_listing.load(Ordering::SeqCst) {
            return Err(ClusterError::Transport("connection refused".to_string()));
        }
        Ok(self.namespaces.clone())
    }

    async fn list_resources(
        &self,
        namespace: &str,
        kind: ResourceKind,
    ) -> Result<Vec<ResourceEntry>, ClusterError> {
        if self.failing_namespaces.contains(namespace) {
            return Err(ClusterError::enumeration(
                format!("{} in namespace {}", kind, namespace),
                "forbidden",
            ));
        }

        Ok(match kind {
            ResourceKind::Pod => vec![ResourceEntry::named("web-1"), ResourceEntry::named("web-2")],
            ResourceKind::Deployment => vec![ResourceEntry::with_selector("web", web_selector())],
            ResourceKind::Service => vec![ResourceEntry::with_selector("web-svc", web_selector())],
        })
    }

    async fn pods_matching(
        &self,
        namespace: &str,
        _selector: &Selector,
    ) -> Result<Vec<String>, ClusterError> {
        if self.failing_selector_namespaces.contains(namespace) {
            return Err(ClusterError::enumeration(
                format!("pods in namespace {}", namespace),
                "the server was unable to return a response in the time allotted",
            ));
        }
        Ok(vec!["web-1".to_string(), "web-2".to_string()])
    }

    async fn pod_usage(&self, _namespace: &str) -> Result<Vec<PodUsage>, ClusterError> {
        Ok(vec![
            PodUsage {
                pod_name: "web-1".to_string(),
                containers: vec![ContainerUsage {
                    cpu_millicores: 100,
                    memory_bytes: 64 * 1024 * 1024,
                }],
            },
            PodUsage {
                pod_name: "web-2".to_string(),
                containers: vec![ContainerUsage {
                    cpu_millicores: 200,
                    memory_bytes: 32 * 1024 * 1024,
                }],
            },
        ])
    }
}

#[derive(Default)]
struct MockDelivery {
    delivered: Mutex<Vec<Snapshot>>,
    reject: AtomicBool,
}

impl MockDelivery {
    fn rejecting() -> Self {
        Self {
            reject: AtomicBool::new(true),
            ..Default::default()
        }
    }
}

#[async_trait]
impl SnapshotDelivery for MockDelivery {
    async fn deliver(&self, snapshot: &Snapshot) -> Result<Ack, DeliveryFailure> {
        if self.reject.load(Ordering::SeqCst) {
            return Err(DeliveryFailure::Rejected("store full".to_string()));
        }
        self.delivered.lock().unwrap().push(snapshot.clone());
        Ok(Ack {
            message: "Data received successfully".to_string(),
        })
    }
}

fn build_loop(
    inventory: Arc<MockInventory>,
    delivery: Arc<MockDelivery>,
    health: HealthRegistry,
) -> CollectionLoop {
    CollectionLoopBuilder::new()
        .inventory(inventory)
        .delivery(delivery)
        .health(health)
        .source("test-node")
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_full_cycle_delivers_snapshot() {
    let inventory = Arc::new(MockInventory::new(&["default", "shop"]));
    let delivery = Arc::new(MockDelivery::default());
    let health = HealthRegistry::for_pipeline().await;
    let collection = build_loop(inventory, delivery.clone(), health.clone());

    let report = assert_ok!(collection.run_cycle().await);

    assert!(!report.is_partial());
    assert_eq!(report.namespaces_total, 2);
    assert_eq!(report.namespaces_collected, 2);
    assert_eq!(report.metrics, 6);

    let delivered = delivery.delivered.lock().unwrap();
    assert_eq!(delivered.len(), 1);

    let snapshot = &delivered[0];
    assert!(snapshot.timestamp > 0);
    assert_eq!(snapshot.resources[0].services.len(), 1);

    let deployment = snapshot
        .metrics
        .iter()
        .find(|m| m.kind == ResourceKind::Deployment && m.namespace == "default")
        .unwrap();
    assert!((deployment.cpu_cores - 0.3).abs() < 1e-9);
    assert!((deployment.memory_mib - 96.0).abs() < 1e-9);

    assert_eq!(health.health().await.status, ComponentStatus::Healthy);
}

#[tokio::test]
async fn test_namespace_failure_yields_partial_snapshot() {
    let inventory = Arc::new(MockInventory::new(&["ns1", "ns2", "ns3"]).failing("ns2"));
    let delivery = Arc::new(MockDelivery::default());
    let health = HealthRegistry::for_pipeline().await;
    let collection = build_loop(inventory, delivery.clone(), health.clone());

    let report = assert_ok!(collection.run_cycle().await);

    assert!(report.is_partial());
    assert_eq!(report.namespaces_collected, 2);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].0, "ns2");

    let delivered = delivery.delivered.lock().unwrap();
    let namespaces: Vec<_> = delivered[0].namespaces().collect();
    assert_eq!(namespaces, vec!["ns1", "ns3"]);
    assert!(delivered[0].metrics.iter().all(|m| m.namespace != "ns2"));

    let health = health.health().await;
    assert_eq!(
        health.components[components::COLLECTOR].status,
        ComponentStatus::Degraded
    );
}

#[tokio::test]
async fn test_namespace_listing_failure_aborts_cycle() {
    let inventory = MockInventory::new(&["default"]);
    inventory.fail_namespace_listing.store(true, Ordering::SeqCst);
    let delivery = Arc::new(MockDelivery::default());
    let health = HealthRegistry::for_pipeline().await;
    let collection = build_loop(Arc::new(inventory), delivery.clone(), health.clone());

    let result = collection.run_cycle().await;

    assert!(matches!(result, Err(CycleError::NamespaceEnumeration(_))));
    assert!(delivery.delivered.lock().unwrap().is_empty());
    assert_eq!(
        health.health().await.components[components::CLUSTER].status,
        ComponentStatus::Degraded
    );
}

#[tokio::test]
async fn test_delivery_failure_is_reported() {
    let inventory = Arc::new(MockInventory::new(&["default"]));
    let delivery = Arc::new(MockDelivery::rejecting());
    let health = HealthRegistry::for_pipeline().await;
    let collection = build_loop(inventory, delivery, health.clone());

    let result = collection.run_cycle().await;

    assert!(matches!(
        result,
        Err(CycleError::Delivery(DeliveryFailure::Rejected(_)))
    ));
    assert_eq!(
        health.health().await.components[components::DELIVERY].status,
        ComponentStatus::Degraded
    );
}

#[tokio::test]
async fn test_selector_failure_skips_namespace() {
    let inventory = Arc::new(MockInventory::new(&["ns1", "ns2", "ns3"]).failing_selectors("ns2"));
    let delivery = Arc::new(MockDelivery::default());
    let health = HealthRegistry::for_pipeline().await;
    let collection = build_loop(inventory, delivery.clone(), health.clone());

    let report = assert_ok!(collection.run_cycle().await);

    assert!(report.is_partial());
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].0, "ns2");
    assert!(report.skipped[0].1.contains("pods in namespace ns2"));

    let delivered = delivery.delivered.lock().unwrap();
    assert_eq!(delivered.len(), 1);
    let namespaces: Vec<_> = delivered[0].namespaces().collect();
    assert_eq!(namespaces, vec!["ns1", "ns3"]);
    // Pod metrics of ns2 are dropped with its deployments
    assert!(delivered[0].metrics.iter().all(|m| m.namespace != "ns2"));
    assert_eq!(delivered[0].metrics.len(), 6);
}

#[tokio::test]
async fn test_repeated_aborts_mark_cluster_unhealthy() {
    let inventory = Arc::new(MockInventory::new(&["default"]));
    inventory.fail_namespace_listing.store(true, Ordering::SeqCst);
    let health = HealthRegistry::for_pipeline().await;
    health.set_ready(true);
    let collection = build_loop(inventory.clone(), Arc::new(MockDelivery::default()), health.clone());

    for _ in 1..DEFAULT_UNHEALTHY_AFTER {
        assert!(collection.run_cycle().await.is_err());
    }
    assert_eq!(health.health().await.status, ComponentStatus::Degraded);
    assert!(health.readiness().await.ready);

    assert!(collection.run_cycle().await.is_err());
    let status = health.health().await;
    assert_eq!(status.status, ComponentStatus::Unhealthy);
    assert_eq!(
        status.components[components::CLUSTER].status,
        ComponentStatus::Unhealthy
    );
    assert!(!health.readiness().await.ready);

    // One good cycle brings the agent back
    inventory.fail_namespace_listing.store(false, Ordering::SeqCst);
    assert_ok!(collection.run_cycle().await);
    assert_eq!(health.health().await.status, ComponentStatus::Healthy);
    assert!(health.readiness().await.ready);
}

#[tokio::test]
async fn test_repeated_delivery_failures_mark_delivery_unhealthy() {
    let inventory = Arc::new(MockInventory::new(&["default"]));
    let delivery = Arc::new(MockDelivery::rejecting());
    let health = HealthRegistry::for_pipeline().await;
    let collection = build_loop(inventory, delivery.clone(), health.clone());

    for _ in 0..DEFAULT_UNHEALTHY_AFTER {
        assert!(collection.run_cycle().await.is_err());
    }

    let status = health.health().await;
    let component = &status.components[components::DELIVERY];
    assert_eq!(component.status, ComponentStatus::Unhealthy);
    assert_eq!(component.consecutive_failures, DEFAULT_UNHEALTHY_AFTER);
    // Collection itself kept working
    assert_eq!(
        status.components[components::CLUSTER].status,
        ComponentStatus::Healthy
    );

    delivery.reject.store(false, Ordering::SeqCst);
    assert_ok!(collection.run_cycle().await);
    let status = health.health().await;
    assert_eq!(
        status.components[components::DELIVERY].status,
        ComponentStatus::Healthy
    );
    assert_eq!(status.components[components::DELIVERY].consecutive_failures, 0);
}

#[tokio::test]
async fn test_try_begin_is_exclusive() {
    let collection = build_loop(
        Arc::new(MockInventory::new(&[])),
        Arc::new(MockDelivery::default()),
        HealthRegistry::new(),
    );

    let guard = collection.try_begin().unwrap();
    assert!(collection.is_running_cycle());
    assert!(collection.clone().try_begin().is_none());

    drop(guard);
    assert!(!collection.is_running_cycle());
    assert!(collection.try_begin().is_some());
}

#[tokio::test(start_paused = true)]
async fn test_ticks_during_running_cycle_are_skipped() {
    let mut inventory = MockInventory::new(&["default"]);
    inventory.list_delay = Duration::from_secs(45);
    let inventory = Arc::new(inventory);
    let delivery = Arc::new(MockDelivery::default());

    let collection = CollectionLoopBuilder::new()
        .inventory(inventory.clone())
        .delivery(delivery.clone())
        .interval(Duration::from_secs(30))
        .build()
        .unwrap();

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let handle = tokio::spawn(collection.run(shutdown_rx));

    // Ticks at 0s, 30s, 60s and 90s; each cycle takes 45s, so the ticks at
    // 30s and 90s are skipped and the cycle started at 60s ends at 105s
    tokio::time::sleep(Duration::from_secs(100)).await;
    shutdown_tx.send(()).unwrap();
    handle.await.unwrap();

    assert_eq!(inventory.list_calls.load(Ordering::SeqCst), 2);
    assert_eq!(delivery.delivered.lock().unwrap().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_waits_for_in_flight_cycle() {
    let mut inventory = MockInventory::new(&["default"]);
    inventory.list_delay = Duration::from_secs(45);
    let delivery = Arc::new(MockDelivery::default());

    let collection = CollectionLoopBuilder::new()
        .inventory(Arc::new(inventory))
        .delivery(delivery.clone())
        .interval(Duration::from_secs(30))
        .build()
        .unwrap();
    let observer = collection.clone();

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let handle = tokio::spawn(collection.run(shutdown_rx));

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert!(observer.is_running_cycle());
    shutdown_tx.send(()).unwrap();
    handle.await.unwrap();

    // The cycle started at 0s completed before run returned
    assert!(!observer.is_running_cycle());
    assert_eq!(delivery.delivered.lock().unwrap().len(), 1);
}

#[test]
fn test_builder_requires_inventory_and_delivery() {
    let result = CollectionLoopBuilder::new()
        .delivery(Arc::new(MockDelivery::default()))
        .build();
    assert!(result.is_err());

    let result = CollectionLoopBuilder::new()
        .inventory(Arc::new(MockInventory::new(&[])))
        .build();
    assert!(result.is_err());
}

#[test]
fn test_builder_rejects_zero_interval() {
    let result = CollectionLoopBuilder::new()
        .inventory(Arc::new(MockInventory::new(&[])))
        .delivery(Arc::new(MockDelivery::default()))
        .interval(Duration::ZERO)
        .build();
    assert!(result.is_err());
}
