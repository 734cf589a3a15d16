//! Conversions between domain types and wire types

use super::fleet::v1 as wire;
use crate::error::ModelError;
use crate::logtail::{LogBatch, LogTailRequest};
use crate::models::{LogLevel, LogRecord, ResourceInfo, ResourceKind, ResourceMetric, Snapshot};

impl From<&Snapshot> for wire::AgentData {
    fn from(snapshot: &Snapshot) -> Self {
        Self {
            resources: snapshot.resources.iter().map(Into::into).collect(),
            metrics: snapshot.metrics.iter().map(Into::into).collect(),
            timestamp: snapshot.timestamp,
        }
    }
}

impl TryFrom<wire::AgentData> for Snapshot {
    type Error = ModelError;

    fn try_from(data: wire::AgentData) -> Result<Self, Self::Error> {
        let metrics = data
            .metrics
            .into_iter()
            .map(ResourceMetric::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Snapshot {
            resources: data.resources.into_iter().map(Into::into).collect(),
            metrics,
            timestamp: data.timestamp,
        })
    }
}

impl From<&ResourceInfo> for wire::ResourceInfo {
    fn from(info: &ResourceInfo) -> Self {
        Self {
            namespace: info.namespace.clone(),
            pods: info.pods.iter().cloned().collect(),
            deployments: info.deployments.iter().cloned().collect(),
            services: info.services.iter().cloned().collect(),
        }
    }
}

impl From<wire::ResourceInfo> for ResourceInfo {
    fn from(info: wire::ResourceInfo) -> Self {
        Self {
            namespace: info.namespace,
            pods: info.pods.into_iter().collect(),
            deployments: info.deployments.into_iter().collect(),
            services: info.services.into_iter().collect(),
        }
    }
}

impl From<&ResourceMetric> for wire::ResourceMetric {
    fn from(metric: &ResourceMetric) -> Self {
        Self {
            namespace: metric.namespace.clone(),
            name: metric.name.clone(),
            kind: metric.kind.as_str().to_string(),
            cpu: metric.cpu_cores,
            memory: metric.memory_mib,
        }
    }
}

impl TryFrom<wire::ResourceMetric> for ResourceMetric {
    type Error = ModelError;

    fn try_from(metric: wire::ResourceMetric) -> Result<Self, Self::Error> {
        // Metrics are only ever produced for pods and deployments, spelled as
        // `ResourceKind::as_str` spells them.
        let kind = match metric.kind.as_str() {
            "Pod" => ResourceKind::Pod,
            "Deployment" => ResourceKind::Deployment,
            _ => return Err(ModelError::UnknownKind(metric.kind)),
        };

        Ok(Self {
            kind,
            namespace: metric.namespace,
            name: metric.name,
            cpu_cores: metric.cpu,
            memory_mib: metric.memory,
        })
    }
}

impl From<&LogRecord> for wire::PodLog {
    fn from(record: &LogRecord) -> Self {
        Self {
            namespace: record.namespace.clone(),
            pod_name: record.pod.clone(),
            container_name: record.container.clone(),
            log_line: record.line.clone(),
            timestamp: record.timestamp,
            level: record.level.as_str().to_string(),
        }
    }
}

impl From<wire::PodLog> for LogRecord {
    fn from(log: wire::PodLog) -> Self {
        // Levels are produced by our own classifier; reclassify anything unexpected.
        let level = log
            .level
            .parse::<LogLevel>()
            .unwrap_or_else(|_| LogLevel::classify(&log.log_line));

        Self {
            namespace: log.namespace,
            pod: log.pod_name,
            container: log.container_name,
            line: log.log_line,
            timestamp: log.timestamp,
            level,
        }
    }
}

impl From<&LogBatch> for wire::LogStream {
    fn from(batch: &LogBatch) -> Self {
        Self {
            logs: batch.logs.iter().map(Into::into).collect(),
            is_complete: batch.is_complete,
        }
    }
}

impl From<wire::LogRequest> for LogTailRequest {
    fn from(req: wire::LogRequest) -> Self {
        Self {
            namespace: req.namespace,
            pod_name: req.pod_name,
            container_name: Some(req.container_name).filter(|c| !c.is_empty()),
            tail_lines: Some(i64::from(req.tail_lines)).filter(|n| *n > 0),
            follow: req.follow,
        }
    }
}

impl From<&LogTailRequest> for wire::LogRequest {
    fn from(req: &LogTailRequest) -> Self {
        Self {
            namespace: req.namespace.clone(),
            pod_name: req.pod_name.clone(),
            container_name: req.container_name.clone().unwrap_or_default(),
            tail_lines: req
                .tail_lines
                .map(|n| i32::try_from(n).unwrap_or(i32::MAX))
                .unwrap_or(0),
            follow: req.follow,
        }
    }
}
