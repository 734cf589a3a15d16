//! Fleet agent
//!
//! Runs the collection loop against the local cluster and serves health and
//! metrics endpoints for the kubelet and Prometheus.

pub mod api;
pub mod config;
