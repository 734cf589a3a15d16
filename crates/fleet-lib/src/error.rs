//! Error types for the telemetry pipeline
//!
//! Each failure is confined to the narrowest unit of work: one namespace,
//! one cycle, one delivery call or one log session.

use std::time::Duration;
use thiserror::Error;

/// Failures reported by the cluster capabilities
#[derive(Debug, Error)]
pub enum ClusterError {
    /// Listing namespaces, pods, deployments or services failed
    #[error("failed to list {what}: {message}")]
    Enumeration { what: String, message: String },

    /// The usage (metrics API) query failed
    #[error("failed to query usage in namespace {namespace}: {message}")]
    UsageQuery { namespace: String, message: String },

    /// Reading container logs failed
    #[error("failed to read logs for {pod}/{container}: {message}")]
    LogSource {
        pod: String,
        container: String,
        message: String,
    },

    /// The cluster API could not be reached
    #[error("cluster transport failure: {0}")]
    Transport(String),
}

impl ClusterError {
    pub fn enumeration(what: impl Into<String>, message: impl ToString) -> Self {
        ClusterError::Enumeration {
            what: what.into(),
            message: message.to_string(),
        }
    }
}

/// Any failure to hand a snapshot to the collector.
///
/// Callers log and wait for the next cycle whatever the variant.
#[derive(Debug, Error)]
pub enum DeliveryFailure {
    #[error("transport failure: {0}")]
    Transport(String),

    #[error("delivery timed out after {0:?}")]
    Timeout(Duration),

    #[error("collector rejected snapshot: {0}")]
    Rejected(String),

    #[error("invalid collector endpoint: {0}")]
    Endpoint(String),
}

impl DeliveryFailure {
    /// Short label used for metrics
    pub fn reason(&self) -> &'static str {
        match self {
            DeliveryFailure::Transport(_) => "transport",
            DeliveryFailure::Timeout(_) => "timeout",
            DeliveryFailure::Rejected(_) => "rejected",
            DeliveryFailure::Endpoint(_) => "endpoint",
        }
    }
}

/// Failures that end a collection cycle
#[derive(Debug, Error)]
pub enum CycleError {
    /// Namespaces could not be listed; nothing was collected
    #[error("cycle aborted: {0}")]
    NamespaceEnumeration(#[source] ClusterError),

    /// A snapshot was assembled but could not be delivered
    #[error("snapshot delivery failed: {0}")]
    Delivery(#[source] DeliveryFailure),
}

/// Failures that end a log tail session
#[derive(Debug, Error)]
pub enum LogTailError {
    #[error("failed to resolve containers of pod {pod}: {source}")]
    ContainerResolution {
        pod: String,
        #[source]
        source: ClusterError,
    },

    #[error("failed to fetch historical logs for container {container}: {source}")]
    Historical {
        container: String,
        #[source]
        source: ClusterError,
    },

    /// The consumer went away while a batch was being sent
    #[error("log stream consumer disconnected")]
    StreamClosed,

    /// The consumer went away between sends
    #[error("log stream cancelled")]
    Cancelled,
}

impl LogTailError {
    /// True when the session ended because the consumer is gone
    pub fn is_disconnect(&self) -> bool {
        matches!(self, LogTailError::StreamClosed | LogTailError::Cancelled)
    }
}

/// Failures converting wire payloads into domain types
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ModelError {
    #[error("unknown resource kind: {0}")]
    UnknownKind(String),

    #[error("unknown log level: {0}")]
    UnknownLevel(String),
}
