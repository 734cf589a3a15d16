//! Output formatting utilities

use clap::ValueEnum;
use colored::Colorize;
use fleet_lib::models::LogLevel;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Print a table, or the raw items as JSON
pub fn print_table<T: Tabled, J: Serialize + ?Sized>(rows: &[T], raw: &J, format: OutputFormat) {
    match format {
        OutputFormat::Table => {
            if rows.is_empty() {
                println!("{}", "No items found".yellow());
                return;
            }
            let table = Table::new(rows).with(Style::rounded()).to_string();
            println!("{}", table);
        }
        OutputFormat::Json => print_json(raw),
    }
}

pub fn print_json<J: Serialize + ?Sized>(value: &J) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => print_error(&format!("Failed to encode JSON: {}", e)),
    }
}

/// Print an error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Format CPU cores, switching to millicores below one core
pub fn format_cores(cores: f64) -> String {
    if cores >= 1.0 {
        format!("{:.2}", cores)
    } else {
        format!("{:.0}m", cores * 1000.0)
    }
}

/// Format MiB as human-readable string
pub fn format_mib(mib: f64) -> String {
    if mib >= 1024.0 {
        format!("{:.2}Gi", mib / 1024.0)
    } else {
        format!("{:.1}Mi", mib)
    }
}

/// Format unix seconds in UTC
pub fn format_timestamp(timestamp: i64) -> String {
    match chrono::DateTime::from_timestamp(timestamp, 0) {
        Some(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => timestamp.to_string(),
    }
}

/// Color status based on value
pub fn color_status(status: &str) -> String {
    match status.to_lowercase().as_str() {
        "healthy" | "running" => status.green().to_string(),
        "degraded" | "warning" => status.yellow().to_string(),
        "unhealthy" | "error" | "failed" => status.red().to_string(),
        _ => status.to_string(),
    }
}

pub fn color_level(level: LogLevel) -> String {
    let label = format!("{:<5}", level.as_str());
    match level {
        LogLevel::Error => label.red().bold().to_string(),
        LogLevel::Warn => label.yellow().to_string(),
        LogLevel::Debug => label.dimmed().to_string(),
        LogLevel::Info => label.blue().to_string(),
    }
}
