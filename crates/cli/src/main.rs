//! fleetctl
//!
//! Command-line client for the fleet telemetry collector: inspect retained
//! snapshots and tail container logs.

mod client;
mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{logs, snapshots};
use fleet_lib::models::ResourceKind;

/// Fleet telemetry CLI
#[derive(Parser)]
#[command(name = "fleetctl")]
#[command(author, version, about = "CLI for the fleet telemetry collector", long_about = None)]
pub struct Cli {
    /// Collector HTTP API URL [default: http://localhost:3000]
    #[arg(long, env = "FLEET_API_URL")]
    pub api_url: Option<String>,

    /// Collector gRPC URL used for log streaming [default: http://localhost:50051]
    #[arg(long, env = "FLEET_GRPC_URL")]
    pub grpc_url: Option<String>,

    /// Output format
    #[arg(long, short, default_value = "table")]
    pub format: output::OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show collector health and retained snapshot count
    Health,

    /// List retained snapshots
    Snapshots,

    /// Show resource usage from the latest snapshot
    Top {
        /// Filter by namespace
        #[arg(long, short)]
        namespace: Option<String>,

        /// Filter by kind (pod, deployment)
        #[arg(long, short)]
        kind: Option<ResourceKind>,
    },

    /// Tail container logs of a pod
    Logs {
        /// Pod namespace
        namespace: String,

        /// Pod name
        pod: String,

        /// Container name (all containers if not specified)
        #[arg(long, short)]
        container: Option<String>,

        /// Number of recent lines to show first
        #[arg(long)]
        tail: Option<i64>,

        /// Keep streaming new lines
        #[arg(long, short)]
        follow: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = config::Config::load()?;

    match cli.command {
        Commands::Health => {
            let client = client::ApiClient::new(&config.api_url(cli.api_url))?;
            snapshots::show_health(&client, cli.format).await?;
        }
        Commands::Snapshots => {
            let client = client::ApiClient::new(&config.api_url(cli.api_url))?;
            snapshots::list_snapshots(&client, cli.format).await?;
        }
        Commands::Top { namespace, kind } => {
            let client = client::ApiClient::new(&config.api_url(cli.api_url))?;
            snapshots::show_top(&client, config.namespace(namespace), kind, cli.format).await?;
        }
        Commands::Logs {
            namespace,
            pod,
            container,
            tail,
            follow,
        } => {
            let options = logs::LogsOptions {
                namespace,
                pod,
                container,
                tail,
                follow,
            };
            if let Err(e) = logs::tail_logs(&config.grpc_url(cli.grpc_url), options, cli.format).await {
                output::print_error(&format!("{:#}", e));
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
