//! Container log tailing over the collector's log stream

use anyhow::{Context, Result};
use colored::Colorize;
use fleet_lib::logtail::LogTailRequest;
use fleet_lib::models::LogRecord;

use crate::client::stream_logs;
use crate::output::{color_level, format_timestamp, print_info, OutputFormat};

/// Options for `fleetctl logs`
pub struct LogsOptions {
    pub namespace: String,
    pub pod: String,
    pub container: Option<String>,
    pub tail: Option<i64>,
    pub follow: bool,
}

impl LogsOptions {
    pub fn to_request(&self) -> LogTailRequest {
        let mut request =
            LogTailRequest::new(self.namespace.clone(), self.pod.clone()).follow(self.follow);
        if let Some(container) = &self.container {
            request = request.container(container.clone());
        }
        if let Some(tail) = self.tail {
            request = request.tail_lines(tail);
        }
        request
    }
}

fn format_record(record: &LogRecord) -> String {
    format!(
        "{} {} {} {}",
        format_timestamp(record.timestamp).dimmed(),
        color_level(record.level),
        format!("[{}]", record.container).cyan(),
        record.line
    )
}

/// Stream logs until the completion marker, the stream ends, or Ctrl-C
pub async fn tail_logs(grpc_url: &str, options: LogsOptions, format: OutputFormat) -> Result<()> {
    let request = options.to_request();
    let mut stream = stream_logs(grpc_url, &request).await?;

    loop {
        let message = tokio::select! {
            message = stream.message() => message.context("Log stream failed")?,
            _ = tokio::signal::ctrl_c() => {
                print_info("Interrupted");
                return Ok(());
            }
        };

        let Some(batch) = message else {
            break;
        };

        for log in batch.logs {
            let record = LogRecord::from(log);
            match format {
                OutputFormat::Table => println!("{}", format_record(&record)),
                OutputFormat::Json => println!("{}", serde_json::to_string(&record)?),
            }
        }

        if batch.is_complete {
            break;
        }
    }

    Ok(())
}
