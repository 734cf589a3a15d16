//! On-demand container log tailing
//!
//! A [`LogTailSession`] serves one log request: the historical tail of each
//! requested container, then (when following) new lines found by polling.
//! Batches are pushed into a [`BatchSink`]; the session ends when the sink's
//! consumer goes away or, for non-follow requests, after a single completion
//! batch.

mod session;

#[cfg(test)]
mod tests;

pub use session::{LogTailSession, SessionSummary};

use crate::error::LogTailError;
use crate::models::{LogLevel, LogRecord};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;
use tokio::sync::mpsc;

/// Default interval between follow polls
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// A log tail request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogTailRequest {
    pub namespace: String,
    pub pod_name: String,
    /// `None` tails every container of the pod in turn
    pub container_name: Option<String>,
    /// `None` returns the whole log
    pub tail_lines: Option<i64>,
    pub follow: bool,
}

impl LogTailRequest {
    pub fn new(namespace: impl Into<String>, pod_name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            pod_name: pod_name.into(),
            container_name: None,
            tail_lines: None,
            follow: false,
        }
    }

    pub fn container(mut self, container: impl Into<String>) -> Self {
        self.container_name = Some(container.into());
        self
    }

    pub fn tail_lines(mut self, lines: i64) -> Self {
        self.tail_lines = Some(lines).filter(|n| *n > 0);
        self
    }

    pub fn follow(mut self, follow: bool) -> Self {
        self.follow = follow;
        self
    }
}

/// One unit of output from a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogBatch {
    pub logs: Vec<LogRecord>,
    pub is_complete: bool,
}

impl LogBatch {
    pub fn lines(logs: Vec<LogRecord>) -> Self {
        Self {
            logs,
            is_complete: false,
        }
    }

    /// The terminal marker sent once a non-follow session finishes
    pub fn complete() -> Self {
        Self {
            logs: Vec::new(),
            is_complete: true,
        }
    }
}

/// Session tuning
#[derive(Debug, Clone)]
pub struct LogTailConfig {
    pub poll_interval: Duration,
}

impl Default for LogTailConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// Lifecycle of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Init,
    Historical,
    Following,
    Complete,
}

/// Start of the next follow window for one container.
///
/// Only moves after a poll returned lines and the batch was sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogTailCursor {
    last_emitted: DateTime<Utc>,
}

impl LogTailCursor {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            last_emitted: start,
        }
    }

    pub fn last_emitted(&self) -> DateTime<Utc> {
        self.last_emitted
    }

    pub fn advance(&mut self, to: DateTime<Utc>) {
        if to > self.last_emitted {
            self.last_emitted = to;
        }
    }
}

/// Destination for log batches
#[async_trait]
pub trait BatchSink: Send + Sync {
    /// Send one batch; fails once the consumer is gone
    async fn send_batch(&self, batch: LogBatch) -> Result<(), LogTailError>;

    /// Resolves when the consumer has gone away
    async fn closed(&self);
}

#[async_trait]
impl BatchSink for mpsc::Sender<LogBatch> {
    async fn send_batch(&self, batch: LogBatch) -> Result<(), LogTailError> {
        self.send(batch)
            .await
            .map_err(|_| LogTailError::StreamClosed)
    }

    async fn closed(&self) {
        mpsc::Sender::closed(self).await
    }
}

/// Turn raw log chunks into classified records.
///
/// Chunks may hold several lines; blank lines are dropped. All records share
/// the conversion time as their timestamp.
pub fn convert_lines(
    namespace: &str,
    pod: &str,
    container: &str,
    chunks: &[String],
) -> Vec<LogRecord> {
    let now = Utc::now().timestamp();

    chunks
        .iter()
        .flat_map(|chunk| chunk.trim().split('\n'))
        .map(str::trim_end)
        .filter(|line| !line.trim().is_empty())
        .map(|line| LogRecord {
            namespace: namespace.to_string(),
            pod: pod.to_string(),
            container: container.to_string(),
            line: line.to_string(),
            timestamp: now,
            level: LogLevel::classify(line),
        })
        .collect()
}
