use super::*;
use crate::cluster::LogSource;
use crate::error::ClusterError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// In-memory log source with scripted poll results
#[derive(Default)]
struct FakeLogSource {
    containers: Vec<String>,
    history: HashMap<String, Vec<String>>,
    failing_history: Vec<String>,
    polls: Mutex<Vec<Result<Vec<String>, String>>>,
    tail_args: Mutex<Vec<(String, Option<i64>)>>,
    since_args: Mutex<Vec<DateTime<Utc>>>,
}

impl FakeLogSource {
    fn with_containers(names: &[&str]) -> Self {
        Self {
            containers: names.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    fn history(mut self, container: &str, lines: &[&str]) -> Self {
        self.history.insert(
            container.to_string(),
            lines.iter().map(|s| s.to_string()).collect(),
        );
        self
    }

    fn failing(mut self, container: &str) -> Self {
        self.failing_history.push(container.to_string());
        self
    }

    fn polls(self, polls: Vec<Result<Vec<String>, String>>) -> Self {
        *self.polls.lock().unwrap() = polls;
        self
    }
}

#[async_trait]
impl LogSource for FakeLogSource {
    async fn pod_containers(&self, _namespace: &str, pod: &str) -> Result<Vec<String>, ClusterError> {
        if self.containers.is_empty() {
            return Err(ClusterError::enumeration(format!("pod {}", pod), "not found"));
        }
        Ok(self.containers.clone())
    }

    async fn tail_logs(
        &self,
        _namespace: &str,
        pod: &str,
        container: &str,
        tail_lines: Option<i64>,
    ) -> Result<Vec<String>, ClusterError> {
        self.tail_args
            .lock()
            .unwrap()
            .push((container.to_string(), tail_lines));

        if self.failing_history.iter().any(|c| c == container) {
            return Err(ClusterError::LogSource {
                pod: pod.to_string(),
                container: container.to_string(),
                message: "container is waiting to start".to_string(),
            });
        }

        let lines = self.history.get(container).cloned().unwrap_or_default();
        let lines = match tail_lines {
            Some(n) => {
                let skip = lines.len().saturating_sub(n as usize);
                lines.into_iter().skip(skip).collect()
            }
            None => lines,
        };
        Ok(lines)
    }

    async fn logs_since(
        &self,
        _namespace: &str,
        pod: &str,
        container: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<String>, ClusterError> {
        self.since_args.lock().unwrap().push(since);

        let mut polls = self.polls.lock().unwrap();
        if polls.is_empty() {
            return Ok(vec![]);
        }
        polls.remove(0).map_err(|message| ClusterError::LogSource {
            pod: pod.to_string(),
            container: container.to_string(),
            message,
        })
    }
}

fn session(source: Arc<FakeLogSource>, request: LogTailRequest) -> LogTailSession {
    LogTailSession::new(source, request, LogTailConfig::default())
}

async fn drain(mut rx: mpsc::Receiver<LogBatch>) -> Vec<LogBatch> {
    let mut batches = Vec::new();
    while let Some(batch) = rx.recv().await {
        batches.push(batch);
    }
    batches
}

#[test]
fn test_convert_lines_splits_and_drops_blanks() {
    let chunks = vec![
        "first line\nERROR: second line\n\n".to_string(),
        "   ".to_string(),
        "WARN: third\r\n".to_string(),
    ];

    let records = convert_lines("default", "web-1", "app", &chunks);

    let lines: Vec<_> = records.iter().map(|r| r.line.as_str()).collect();
    assert_eq!(lines, vec!["first line", "ERROR: second line", "WARN: third"]);
    assert_eq!(records[0].level, LogLevel::Info);
    assert_eq!(records[1].level, LogLevel::Error);
    assert_eq!(records[2].level, LogLevel::Warn);
    assert!(records.iter().all(|r| r.container == "app" && r.pod == "web-1"));
}

#[test]
fn test_cursor_never_moves_backwards() {
    let start = Utc::now();
    let mut cursor = LogTailCursor::new(start);

    cursor.advance(start - chrono::Duration::seconds(10));
    assert_eq!(cursor.last_emitted(), start);

    let later = start + chrono::Duration::seconds(5);
    cursor.advance(later);
    assert_eq!(cursor.last_emitted(), later);
}

#[test]
fn test_request_builder_ignores_non_positive_tail() {
    let request = LogTailRequest::new("default", "web-1").tail_lines(0);
    assert_eq!(request.tail_lines, None);

    let request = LogTailRequest::new("default", "web-1").tail_lines(20);
    assert_eq!(request.tail_lines, Some(20));
}

#[tokio::test]
async fn test_non_follow_sends_history_then_completion() {
    let history: Vec<String> = (0..80).map(|i| format!("line {}", i)).collect();
    let refs: Vec<&str> = history.iter().map(String::as_str).collect();
    let source = Arc::new(FakeLogSource::with_containers(&["app"]).history("app", &refs));

    let request = LogTailRequest::new("default", "web-1")
        .container("app")
        .tail_lines(50);

    let session = session(source.clone(), request);
    let state = session.subscribe();
    assert_eq!(*state.borrow(), SessionState::Init);

    let (tx, rx) = mpsc::channel(16);
    let summary = session.run(&tx).await.unwrap();
    drop(tx);

    assert_eq!(*state.borrow(), SessionState::Complete);

    let batches = drain(rx).await;
    assert_eq!(batches.len(), 2);
    assert!(!batches[0].is_complete);
    assert_eq!(batches[0].logs.len(), 50);
    assert_eq!(batches[0].logs[0].line, "line 30");
    assert_eq!(batches[1], LogBatch::complete());

    assert_eq!(summary.batches, 2);
    assert_eq!(summary.lines, 50);
    assert_eq!(
        source.tail_args.lock().unwrap().as_slice(),
        &[("app".to_string(), Some(50))]
    );
}

#[tokio::test]
async fn test_empty_history_sends_only_completion() {
    let source = Arc::new(FakeLogSource::with_containers(&["app"]));
    let request = LogTailRequest::new("default", "web-1").container("app");

    let (tx, rx) = mpsc::channel(16);
    session(source, request).run(&tx).await.unwrap();
    drop(tx);

    let batches = drain(rx).await;
    assert_eq!(batches, vec![LogBatch::complete()]);
}

#[tokio::test]
async fn test_fan_out_processes_containers_in_order() {
    let source = Arc::new(
        FakeLogSource::with_containers(&["init", "app", "sidecar"])
            .history("init", &["init done"])
            .history("sidecar", &["proxy ready"])
            .failing("app"),
    );
    let request = LogTailRequest::new("default", "web-1");

    let (tx, rx) = mpsc::channel(16);
    let summary = session(source, request).run(&tx).await.unwrap();
    drop(tx);

    let batches = drain(rx).await;
    assert_eq!(batches.len(), 3);
    assert_eq!(batches[0].logs[0].container, "init");
    assert_eq!(batches[1].logs[0].container, "sidecar");
    assert!(batches[2].is_complete);
    assert_eq!(summary.containers, 3);
}

#[tokio::test]
async fn test_named_container_failure_ends_session() {
    let source = Arc::new(FakeLogSource::with_containers(&["app"]).failing("app"));
    let request = LogTailRequest::new("default", "web-1").container("app");

    let session = session(source, request);
    let state = session.subscribe();

    let (tx, rx) = mpsc::channel(16);
    let result = session.run(&tx).await;
    drop(tx);

    assert!(matches!(result, Err(LogTailError::Historical { .. })));
    // Never completed
    assert_eq!(*state.borrow(), SessionState::Historical);
    assert!(drain(rx).await.is_empty());
}

#[tokio::test]
async fn test_container_resolution_failure() {
    let source = Arc::new(FakeLogSource::default());
    let request = LogTailRequest::new("default", "missing");

    let (tx, _rx) = mpsc::channel(16);
    let result = session(source, request).run(&tx).await;

    assert!(matches!(result, Err(LogTailError::ContainerResolution { .. })));
}

#[tokio::test(start_paused = true)]
async fn test_failed_poll_keeps_cursor() {
    let source = Arc::new(
        FakeLogSource::with_containers(&["app"])
            .history("app", &["booting"])
            .polls(vec![
                Err("apiserver timeout".to_string()),
                Ok(vec!["ERROR: request failed".to_string()]),
            ]),
    );
    let request = LogTailRequest::new("default", "web-1")
        .container("app")
        .follow(true);

    let (tx, mut rx) = mpsc::channel(16);
    let task_source = source.clone();
    let handle = tokio::spawn(async move { session(task_source, request).run(&tx).await });

    let historical = rx.recv().await.unwrap();
    assert_eq!(historical.logs[0].line, "booting");

    let followed = rx.recv().await.unwrap();
    assert!(!followed.is_complete);
    assert_eq!(followed.logs[0].level, LogLevel::Error);

    // Wait for the poll after the successful one
    while source.since_args.lock().unwrap().len() < 3 {
        tokio::time::sleep(DEFAULT_POLL_INTERVAL).await;
    }

    drop(rx);
    let result = handle.await.unwrap();
    assert!(matches!(result, Err(LogTailError::Cancelled)));

    let since = source.since_args.lock().unwrap().clone();
    assert_eq!(since[0], since[1]);
    assert!(since[2] >= since[1]);
}

#[tokio::test(start_paused = true)]
async fn test_follow_ends_when_consumer_drops() {
    let source = Arc::new(FakeLogSource::with_containers(&["app", "sidecar"]));
    let request = LogTailRequest::new("default", "web-1").follow(true);

    let session = session(source.clone(), request);
    let mut state = session.subscribe();

    let (tx, rx) = mpsc::channel(16);
    let handle = tokio::spawn(async move { session.run(&tx).await });

    let following = state
        .wait_for(|s| *s == SessionState::Following)
        .await
        .map(|s| *s);
    assert_eq!(following.unwrap(), SessionState::Following);

    tokio::time::sleep(DEFAULT_POLL_INTERVAL * 3).await;
    drop(rx);

    let result = handle.await.unwrap();
    assert!(matches!(result, Err(LogTailError::Cancelled)));

    // The first container follows until cancellation; the second never starts
    let tails = source.tail_args.lock().unwrap().clone();
    assert_eq!(tails.len(), 1);
    assert_eq!(tails[0].0, "app");
}
