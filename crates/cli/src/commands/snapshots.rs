//! Snapshot inspection commands

use anyhow::Result;
use colored::Colorize;
use fleet_lib::models::{ResourceKind, ResourceMetric, Snapshot};
use tabled::Tabled;

use crate::client::ApiClient;
use crate::output::{
    color_status, format_cores, format_mib, format_timestamp, print_json, print_table,
    print_warning, OutputFormat,
};

/// Row for the snapshots table
#[derive(Tabled)]
struct SnapshotRow {
    #[tabled(rename = "Time (UTC)")]
    time: String,
    #[tabled(rename = "Namespaces")]
    namespaces: usize,
    #[tabled(rename = "Pods")]
    pods: usize,
    #[tabled(rename = "Deployments")]
    deployments: usize,
    #[tabled(rename = "Metrics")]
    metrics: usize,
}

impl From<&Snapshot> for SnapshotRow {
    fn from(snapshot: &Snapshot) -> Self {
        Self {
            time: format_timestamp(snapshot.timestamp),
            namespaces: snapshot.resources.len(),
            pods: snapshot.resources.iter().map(|r| r.pods.len()).sum(),
            deployments: snapshot.resources.iter().map(|r| r.deployments.len()).sum(),
            metrics: snapshot.metrics.len(),
        }
    }
}

/// Row for the top table
#[derive(Tabled)]
struct MetricRow {
    #[tabled(rename = "Namespace")]
    namespace: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "CPU")]
    cpu: String,
    #[tabled(rename = "Memory")]
    memory: String,
}

/// Show collector health
pub async fn show_health(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let health = client.health().await?;

    match format {
        OutputFormat::Json => print_json(&health),
        OutputFormat::Table => {
            println!("{}", "Collector Status".bold());
            println!("{}", "=".repeat(40));
            println!("Status:     {}", color_status(&health.status));
            println!("Snapshots:  {}", health.data_points);
        }
    }

    Ok(())
}

/// List retained snapshots, oldest first
pub async fn list_snapshots(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let snapshots = client.snapshots().await?;

    let rows: Vec<SnapshotRow> = snapshots.iter().map(SnapshotRow::from).collect();
    print_table(&rows, &snapshots, format);

    if matches!(format, OutputFormat::Table) && !rows.is_empty() {
        println!("\nTotal: {} snapshots", rows.len());
    }

    Ok(())
}

/// Metrics from the latest snapshot, heaviest CPU first
pub fn select_metrics(
    snapshot: &Snapshot,
    namespace: Option<&str>,
    kind: Option<ResourceKind>,
) -> Vec<ResourceMetric> {
    let mut metrics: Vec<ResourceMetric> = snapshot
        .metrics
        .iter()
        .filter(|m| namespace.map_or(true, |ns| m.namespace == ns))
        .filter(|m| kind.map_or(true, |k| m.kind == k))
        .cloned()
        .collect();

    metrics.sort_by(|a, b| b.cpu_cores.total_cmp(&a.cpu_cores));
    metrics
}

/// Show usage from the latest snapshot
pub async fn show_top(
    client: &ApiClient,
    namespace: Option<String>,
    kind: Option<ResourceKind>,
    format: OutputFormat,
) -> Result<()> {
    let Some(snapshot) = client.latest().await? else {
        print_warning("The collector has not received any snapshots yet");
        return Ok(());
    };

    let metrics = select_metrics(&snapshot, namespace.as_deref(), kind);

    let rows: Vec<MetricRow> = metrics
        .iter()
        .map(|m| MetricRow {
            namespace: m.namespace.clone(),
            name: m.name.clone(),
            kind: m.kind.to_string(),
            cpu: format_cores(m.cpu_cores),
            memory: format_mib(m.memory_mib),
        })
        .collect();

    if matches!(format, OutputFormat::Table) {
        println!(
            "Snapshot taken {} UTC\n",
            format_timestamp(snapshot.timestamp).cyan()
        );
    }
    print_table(&rows, &metrics, format);

    Ok(())
}
