//! Fleet telemetry library
//!
//! This crate provides the core functionality for:
//! - Periodic snapshot collection across namespaces
//! - Per-pod and per-deployment metric aggregation
//! - Snapshot delivery to the central collector
//! - Bounded snapshot retention on the collector
//! - On-demand container log tailing
//! - Health checks and observability

pub mod aggregator;
pub mod cluster;
pub mod collector;
pub mod delivery;
pub mod error;
pub mod health;
pub mod logtail;
pub mod models;
pub mod observability;
pub mod proto;
pub mod store;

pub use aggregator::MetricsAggregator;
pub use cluster::{ClusterInventory, KubeCluster, LogSource};
pub use collector::{CollectionLoop, CollectionLoopBuilder, CycleReport};
pub use delivery::{Ack, DeliveryClient, SnapshotDelivery};
pub use error::{ClusterError, CycleError, DeliveryFailure, LogTailError, ModelError};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use logtail::{LogBatch, LogTailConfig, LogTailRequest, LogTailSession};
pub use models::*;
pub use observability::{FleetMetrics, StructuredLogger};
pub use store::RetentionStore;
