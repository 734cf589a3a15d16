//! Observability infrastructure for the agent and the collector
//!
//! Provides:
//! - Prometheus metrics (cycle latency and outcomes, delivery, retention, log sessions)
//! - Structured JSON logging with tracing

use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, register_int_gauge,
    Histogram, IntCounter, IntCounterVec, IntGauge,
};
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{info, warn};

/// Histogram buckets for cycle and delivery latency (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<FleetMetricsInner> = OnceLock::new();

struct FleetMetricsInner {
    cycle_duration_seconds: Histogram,
    cycles_total: IntCounterVec,
    namespaces_skipped: IntCounter,
    ticks_skipped: IntCounter,
    delivery_latency_seconds: Histogram,
    delivery_failures: IntCounterVec,
    snapshots_received: IntCounter,
    snapshots_retained: IntGauge,
    log_sessions_active: IntGauge,
}

impl FleetMetricsInner {
    fn new() -> Self {
        Self {
            cycle_duration_seconds: register_histogram!(
                "kubefleet_cycle_duration_seconds",
                "Time spent assembling and delivering one snapshot",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register cycle_duration_seconds"),

            cycles_total: register_int_counter_vec!(
                "kubefleet_cycles_total",
                "Collection cycles by outcome",
                &["outcome"]
            )
            .expect("Failed to register cycles_total"),

            namespaces_skipped: register_int_counter!(
                "kubefleet_namespaces_skipped_total",
                "Namespaces left out of a snapshot after a scoped failure"
            )
            .expect("Failed to register namespaces_skipped"),

            ticks_skipped: register_int_counter!(
                "kubefleet_ticks_skipped_total",
                "Ticks skipped because a cycle was still running"
            )
            .expect("Failed to register ticks_skipped"),

            delivery_latency_seconds: register_histogram!(
                "kubefleet_delivery_latency_seconds",
                "Time spent delivering a snapshot to the collector",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register delivery_latency_seconds"),

            delivery_failures: register_int_counter_vec!(
                "kubefleet_delivery_failures_total",
                "Failed snapshot deliveries by reason",
                &["reason"]
            )
            .expect("Failed to register delivery_failures"),

            snapshots_received: register_int_counter!(
                "kubefleet_snapshots_received_total",
                "Snapshots accepted by the collector"
            )
            .expect("Failed to register snapshots_received"),

            snapshots_retained: register_int_gauge!(
                "kubefleet_snapshots_retained",
                "Snapshots currently held in the retention store"
            )
            .expect("Failed to register snapshots_retained"),

            log_sessions_active: register_int_gauge!(
                "kubefleet_log_sessions_active",
                "Log tail sessions currently streaming"
            )
            .expect("Failed to register log_sessions_active"),
        }
    }
}

/// Outcome label for a finished cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    Complete,
    Partial,
    Aborted,
    DeliveryFailed,
}

impl CycleOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            CycleOutcome::Complete => "complete",
            CycleOutcome::Partial => "partial",
            CycleOutcome::Aborted => "aborted",
            CycleOutcome::DeliveryFailed => "delivery_failed",
        }
    }
}

/// Pipeline metrics for Prometheus exposition
///
/// This is a lightweight handle to the global metrics instance.
/// Multiple clones share the same underlying metrics.
#[derive(Clone)]
pub struct FleetMetrics {
    _private: (),
}

impl Default for FleetMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl FleetMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(FleetMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &FleetMetricsInner {
        GLOBAL_METRICS.get_or_init(FleetMetricsInner::new)
    }

    pub fn observe_cycle(&self, outcome: CycleOutcome, elapsed: Duration) {
        let inner = self.inner();
        inner.cycle_duration_seconds.observe(elapsed.as_secs_f64());
        inner
            .cycles_total
            .with_label_values(&[outcome.as_str()])
            .inc();
    }

    pub fn add_namespaces_skipped(&self, count: usize) {
        self.inner().namespaces_skipped.inc_by(count as u64);
    }

    pub fn inc_ticks_skipped(&self) {
        self.inner().ticks_skipped.inc();
    }

    pub fn ticks_skipped(&self) -> u64 {
        self.inner().ticks_skipped.get()
    }

    pub fn observe_delivery_latency(&self, elapsed: Duration) {
        self.inner()
            .delivery_latency_seconds
            .observe(elapsed.as_secs_f64());
    }

    pub fn inc_delivery_failures(&self, reason: &str) {
        self.inner()
            .delivery_failures
            .with_label_values(&[reason])
            .inc();
    }

    /// Record an appended snapshot and the resulting store size
    pub fn record_snapshot_received(&self, retained: usize) {
        let inner = self.inner();
        inner.snapshots_received.inc();
        inner.snapshots_retained.set(retained as i64);
    }

    pub fn inc_log_sessions(&self) {
        self.inner().log_sessions_active.inc();
    }

    pub fn dec_log_sessions(&self) {
        self.inner().log_sessions_active.dec();
    }
}

/// Render every registered metric in the Prometheus text format
pub fn gather_metrics() -> Result<String, prometheus::Error> {
    use prometheus::Encoder;

    let encoder = prometheus::TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&prometheus::gather(), &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

/// Structured logger for pipeline events
///
/// Every record carries an `event` field and the emitting component
/// (node name for agents, "collector" on the server side).
#[derive(Clone)]
pub struct StructuredLogger {
    source: String,
}

impl StructuredLogger {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
        }
    }

    pub fn log_startup(&self, component: &str, version: &str) {
        info!(
            event = "startup",
            source = %self.source,
            component = %component,
            version = %version,
            "Fleet component started"
        );
    }

    pub fn log_shutdown(&self, component: &str, reason: &str) {
        info!(
            event = "shutdown",
            source = %self.source,
            component = %component,
            reason = %reason,
            "Fleet component shutting down"
        );
    }

    pub fn log_cycle_completed(
        &self,
        namespaces_collected: usize,
        namespaces_total: usize,
        metrics: usize,
        elapsed: Duration,
    ) {
        if namespaces_collected < namespaces_total {
            warn!(
                event = "cycle_completed",
                source = %self.source,
                partial = true,
                namespaces_collected = namespaces_collected,
                namespaces_total = namespaces_total,
                metrics = metrics,
                elapsed_ms = elapsed.as_millis() as u64,
                "Delivered partial snapshot"
            );
        } else {
            info!(
                event = "cycle_completed",
                source = %self.source,
                partial = false,
                namespaces_collected = namespaces_collected,
                namespaces_total = namespaces_total,
                metrics = metrics,
                elapsed_ms = elapsed.as_millis() as u64,
                "Delivered snapshot"
            );
        }
    }

    pub fn log_namespace_skipped(&self, namespace: &str, reason: &str) {
        warn!(
            event = "namespace_skipped",
            source = %self.source,
            namespace = %namespace,
            reason = %reason,
            "Skipping namespace for this cycle"
        );
    }

    pub fn log_cycle_aborted(&self, reason: &str) {
        warn!(
            event = "cycle_aborted",
            source = %self.source,
            reason = %reason,
            "Collection cycle aborted"
        );
    }

    pub fn log_tick_skipped(&self) {
        warn!(
            event = "tick_skipped",
            source = %self.source,
            "Previous cycle still running, skipping tick"
        );
    }

    pub fn log_delivery_failed(&self, reason: &str) {
        warn!(
            event = "delivery_failed",
            source = %self.source,
            reason = %reason,
            "Snapshot delivery failed, waiting for next cycle"
        );
    }

    pub fn log_snapshot_received(
        &self,
        namespaces: usize,
        metrics: usize,
        timestamp: i64,
        retained: usize,
    ) {
        info!(
            event = "snapshot_received",
            source = %self.source,
            namespaces = namespaces,
            metrics = metrics,
            timestamp = timestamp,
            retained = retained,
            "Received snapshot from agent"
        );
    }

    pub fn log_session_started(&self, namespace: &str, pod: &str, follow: bool) {
        info!(
            event = "log_session_started",
            source = %self.source,
            namespace = %namespace,
            pod = %pod,
            follow = follow,
            "Log tail session started"
        );
    }

    pub fn log_session_ended(&self, namespace: &str, pod: &str, outcome: &str) {
        info!(
            event = "log_session_ended",
            source = %self.source,
            namespace = %namespace,
            pod = %pod,
            outcome = %outcome,
            "Log tail session ended"
        );
    }
}
