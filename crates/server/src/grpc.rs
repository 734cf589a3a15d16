//! gRPC `AgentReporter` service
//!
//! `Deliver` appends to the retention store. `StreamPodLogs` runs a log tail
//! session in its own task and streams its batches back until the session
//! ends or the client goes away.

use async_trait::async_trait;
use fleet_lib::cluster::LogSource;
use fleet_lib::error::{LogTailError, ModelError};
use fleet_lib::logtail::{BatchSink, LogBatch, LogTailConfig, LogTailRequest, LogTailSession};
use fleet_lib::models::Snapshot;
use fleet_lib::observability::{FleetMetrics, StructuredLogger};
use fleet_lib::proto::{AgentData, AgentReporter, LogRequest, LogStream, ReportResponse};
use fleet_lib::store::RetentionStore;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::Stream;
use tonic::{Request, Response, Status};
use tracing::warn;

/// Batches buffered per log stream before the session waits on the client
const LOG_STREAM_BUFFER: usize = 16;

pub const ACK_MESSAGE: &str = "Data received successfully";

/// Collector side of the `AgentReporter` service
#[derive(Clone)]
pub struct FleetReporterService {
    store: RetentionStore,
    logs: Option<Arc<dyn LogSource>>,
    log_config: LogTailConfig,
    metrics: FleetMetrics,
    logger: StructuredLogger,
}

impl FleetReporterService {
    /// `logs` is `None` when the collector has no cluster access; log tail
    /// requests then fail with `UNAVAILABLE`.
    pub fn new(
        store: RetentionStore,
        logs: Option<Arc<dyn LogSource>>,
        log_config: LogTailConfig,
    ) -> Self {
        Self {
            store,
            logs,
            log_config,
            metrics: FleetMetrics::new(),
            logger: StructuredLogger::new("collector"),
        }
    }

    pub fn store(&self) -> &RetentionStore {
        &self.store
    }
}

/// Forwards session batches into the response stream
struct GrpcLogSink {
    tx: mpsc::Sender<Result<LogStream, Status>>,
}

#[async_trait]
impl BatchSink for GrpcLogSink {
    async fn send_batch(&self, batch: LogBatch) -> Result<(), LogTailError> {
        self.tx
            .send(Ok(LogStream::from(&batch)))
            .await
            .map_err(|_| LogTailError::StreamClosed)
    }

    async fn closed(&self) {
        self.tx.closed().await
    }
}

fn invalid_payload(error: ModelError) -> Status {
    Status::invalid_argument(error.to_string())
}

fn session_status(error: &LogTailError) -> Status {
    match error {
        LogTailError::ContainerResolution { .. } => Status::not_found(error.to_string()),
        LogTailError::Historical { .. } => Status::unavailable(error.to_string()),
        LogTailError::StreamClosed | LogTailError::Cancelled => {
            Status::cancelled(error.to_string())
        }
    }
}

#[async_trait]
impl AgentReporter for FleetReporterService {
    async fn deliver(
        &self,
        request: Request<AgentData>,
    ) -> Result<Response<ReportResponse>, Status> {
        let snapshot = Snapshot::try_from(request.into_inner()).map_err(invalid_payload)?;
        let namespaces = snapshot.resources.len();
        let metrics = snapshot.metrics.len();

        let stored = self.store.append(snapshot).await;
        let retained = self.store.count().await;

        self.metrics.record_snapshot_received(retained);
        self.logger
            .log_snapshot_received(namespaces, metrics, stored.timestamp, retained);

        Ok(Response::new(ReportResponse {
            success: true,
            message: ACK_MESSAGE.to_string(),
        }))
    }

    type StreamPodLogsStream = Pin<Box<dyn Stream<Item = Result<LogStream, Status>> + Send>>;

    async fn stream_pod_logs(
        &self,
        request: Request<LogRequest>,
    ) -> Result<Response<Self::StreamPodLogsStream>, Status> {
        let request = LogTailRequest::from(request.into_inner());
        if request.namespace.is_empty() || request.pod_name.is_empty() {
            return Err(Status::invalid_argument("namespace and pod_name are required"));
        }

        let source = self
            .logs
            .clone()
            .ok_or_else(|| Status::unavailable("log access is not configured"))?;

        let (tx, rx) = mpsc::channel(LOG_STREAM_BUFFER);
        let session = LogTailSession::new(source, request.clone(), self.log_config.clone());
        let metrics = self.metrics.clone();
        let logger = self.logger.clone();

        tokio::spawn(async move {
            metrics.inc_log_sessions();
            logger.log_session_started(&request.namespace, &request.pod_name, request.follow);

            let sink = GrpcLogSink { tx };
            let outcome = match session.run(&sink).await {
                Ok(_) => "complete",
                Err(e) if e.is_disconnect() => "cancelled",
                Err(e) => {
                    warn!(
                        namespace = %request.namespace,
                        pod = %request.pod_name,
                        error = %e,
                        "Log tail session failed"
                    );
                    let _ = sink.tx.send(Err(session_status(&e))).await;
                    "failed"
                }
            };

            metrics.dec_log_sessions();
            logger.log_session_ended(&request.namespace, &request.pod_name, outcome);
        });

        let stream = ReceiverStream::new(rx);
        Ok(Response::new(Box::pin(stream) as Self::StreamPodLogsStream))
    }
}
