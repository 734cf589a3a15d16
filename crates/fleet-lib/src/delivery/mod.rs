//! Snapshot delivery to the central collector
//!
//! The collection loop only sees the [`SnapshotDelivery`] trait. The gRPC
//! [`DeliveryClient`] keeps one channel for the life of the agent and turns
//! every kind of failure into a [`DeliveryFailure`].

mod client;


pub use client::{DeliveryClient, DeliveryClientBuilder, DeliveryConfig};

use crate::error::DeliveryFailure;
use crate::models::Snapshot;
use async_trait::async_trait;

/// Positive acknowledgement from the collector
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ack {
    pub message: String,
}

/// Hands a snapshot to the collector
#[async_trait]
pub trait SnapshotDelivery: Send + Sync {
    /// Deliver one snapshot. No retry is attempted.
    async fn deliver(&self, snapshot: &Snapshot) -> Result<Ack, DeliveryFailure>;
}
