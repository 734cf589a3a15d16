//! Log tail session state machine

use super::{
    convert_lines, BatchSink, LogBatch, LogTailConfig, LogTailCursor, LogTailRequest,
    SessionState,
};
use crate::cluster::LogSource;
use crate::error::LogTailError;
use crate::models::LogRecord;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// What a finished session sent
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSummary {
    pub containers: usize,
    pub batches: usize,
    pub lines: usize,
}

/// Serves a single log request against a [`LogSource`]
pub struct LogTailSession {
    source: Arc<dyn LogSource>,
    request: LogTailRequest,
    config: LogTailConfig,
    state: watch::Sender<SessionState>,
    summary: SessionSummary,
}

impl LogTailSession {
    pub fn new(source: Arc<dyn LogSource>, request: LogTailRequest, config: LogTailConfig) -> Self {
        Self {
            source,
            request,
            config,
            state: watch::channel(SessionState::Init).0,
            summary: SessionSummary::default(),
        }
    }

    /// Follow the session's state from outside; the receiver keeps the
    /// final state after `run` consumes the session.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn request(&self) -> &LogTailRequest {
        &self.request
    }

    /// Drive the session to completion.
    ///
    /// Without a named container every container of the pod is processed in
    /// order; a failed historical fetch there is logged and skipped. A follow
    /// session only ends when the consumer goes away, which surfaces as
    /// [`LogTailError::Cancelled`] or [`LogTailError::StreamClosed`].
    pub async fn run<S>(mut self, sink: &S) -> Result<SessionSummary, LogTailError>
    where
        S: BatchSink + ?Sized,
    {
        info!(
            namespace = %self.request.namespace,
            pod = %self.request.pod_name,
            container = ?self.request.container_name,
            tail_lines = ?self.request.tail_lines,
            follow = self.request.follow,
            "Starting log tail session"
        );

        match self.request.container_name.clone() {
            Some(container) => {
                self.tail_container(&container, sink).await?;
            }
            None => {
                let containers = self
                    .source
                    .pod_containers(&self.request.namespace, &self.request.pod_name)
                    .await
                    .map_err(|source| LogTailError::ContainerResolution {
                        pod: self.request.pod_name.clone(),
                        source,
                    })?;

                for container in containers {
                    match self.tail_container(&container, sink).await {
                        Ok(()) => {}
                        Err(e) if e.is_disconnect() => return Err(e),
                        Err(e) => {
                            warn!(
                                pod = %self.request.pod_name,
                                container = %container,
                                error = %e,
                                "Skipping container"
                            );
                        }
                    }
                }
            }
        }

        sink.send_batch(LogBatch::complete()).await?;
        self.state.send_replace(SessionState::Complete);
        self.summary.batches += 1;

        debug!(
            pod = %self.request.pod_name,
            batches = self.summary.batches,
            lines = self.summary.lines,
            "Log tail session complete"
        );

        Ok(self.summary)
    }

    async fn tail_container<S>(&mut self, container: &str, sink: &S) -> Result<(), LogTailError>
    where
        S: BatchSink + ?Sized,
    {
        self.state.send_replace(SessionState::Historical);
        self.summary.containers += 1;

        let chunks = tokio::select! {
            _ = sink.closed() => return Err(LogTailError::Cancelled),
            fetched = self.source.tail_logs(
                &self.request.namespace,
                &self.request.pod_name,
                container,
                self.request.tail_lines,
            ) => fetched.map_err(|source| LogTailError::Historical {
                container: container.to_string(),
                source,
            })?,
        };

        let records = convert_lines(&self.request.namespace, &self.request.pod_name, container, &chunks);
        if !records.is_empty() {
            self.emit(sink, records).await?;
        }

        if !self.request.follow {
            return Ok(());
        }

        self.follow(container, sink).await
    }

    async fn follow<S>(&mut self, container: &str, sink: &S) -> Result<(), LogTailError>
    where
        S: BatchSink + ?Sized,
    {
        self.state.send_replace(SessionState::Following);

        let mut cursor = LogTailCursor::new(Utc::now());
        let poll = self.config.poll_interval;
        let mut ticker = interval_at(Instant::now() + poll, poll);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = sink.closed() => return Err(LogTailError::Cancelled),
                _ = ticker.tick() => {}
            }

            let polled = tokio::select! {
                _ = sink.closed() => return Err(LogTailError::Cancelled),
                polled = self.source.logs_since(
                    &self.request.namespace,
                    &self.request.pod_name,
                    container,
                    cursor.last_emitted(),
                ) => polled,
            };

            match polled {
                Ok(chunks) => {
                    let records =
                        convert_lines(&self.request.namespace, &self.request.pod_name, container, &chunks);
                    if !records.is_empty() {
                        self.emit(sink, records).await?;
                        cursor.advance(Utc::now());
                    }
                }
                Err(e) => {
                    warn!(
                        pod = %self.request.pod_name,
                        container = %container,
                        since = %cursor.last_emitted(),
                        error = %e,
                        "Log poll failed, retrying from the same cursor"
                    );
                }
            }
        }
    }

    async fn emit<S>(&mut self, sink: &S, records: Vec<LogRecord>) -> Result<(), LogTailError>
    where
        S: BatchSink + ?Sized,
    {
        let lines = records.len();
        sink.send_batch(LogBatch::lines(records)).await?;
        self.summary.batches += 1;
        self.summary.lines += lines;
        Ok(())
    }
}
