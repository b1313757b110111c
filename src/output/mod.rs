mod cli;
mod json;

pub use cli::{print_audit_table, print_scan_table};
pub use json::print_json;

use crate::model::{AuditReport, ScanResult};
use anyhow::Result;

/// Output format for scan and audit results
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable table format
    Table,
    /// JSON format for programmatic use
    Json,
}

impl OutputFormat {
    pub const ALL: [(&'static str, &'static str); 2] = [
        ("table", "Project tree and vulnerability tables (default)"),
        ("json", "Pretty-printed JSON with camelCase fields"),
    ];
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(OutputFormat::Table),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Unknown format: {}. Use 'table' or 'json'", s)),
        }
    }
}

pub fn print_scan(result: &ScanResult, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => print_scan_table(result),
        OutputFormat::Json => print_json(result),
    }
}

pub fn print_audit(report: &AuditReport, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => print_audit_table(report),
        OutputFormat::Json => print_json(report),
    }
}
