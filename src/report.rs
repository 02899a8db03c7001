//! Structured run report for downstream tool consumption.
//!
//! Writes a JSON file alongside the output table describing the scan:
//! inputs in scan order, report mode, ranking pool and statistics.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::{FileSummary, RankPool, ReportMode, ScanConfig, ScanSummary};

/// Complete report of a scan.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Tool version
    pub version: String,
    /// Timestamp of run (RFC 3339)
    pub timestamp: String,

    pub inputs: Vec<FileSummary>,
    pub output: String,
    pub mode: ReportMode,
    pub rank_pool: RankPool,
    pub header_lines: usize,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_records: Option<usize>,

    pub statistics: Statistics,
}

#[derive(Debug, Clone, Serialize)]
pub struct Statistics {
    pub total_records: usize,
    pub malformed_records: usize,
    pub qualifying_records: usize,
    pub genes: usize,
    pub reported_mutations: usize,
    pub merged_records: usize,
}

impl From<&ScanSummary> for Statistics {
    fn from(s: &ScanSummary) -> Self {
        Statistics {
            total_records: s.total_records,
            malformed_records: s.malformed_records,
            qualifying_records: s.qualifying_records,
            genes: s.genes,
            reported_mutations: s.reported_mutations,
            merged_records: s.merged_records,
        }
    }
}

impl RunReport {
    pub fn new(config: &ScanConfig, summary: &ScanSummary) -> Self {
        let timestamp = time::OffsetDateTime::now_utc()
            .format(&time::format_description::well_known::Rfc3339)
            .unwrap_or_else(|_| "unknown".to_string());

        RunReport {
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp,
            inputs: summary.files.clone(),
            output: config.output.display().to_string(),
            mode: config.mode,
            rank_pool: config.rank_pool,
            header_lines: config.header_lines,
            max_records: config.max_records,
            statistics: Statistics::from(summary),
        }
    }

    /// Path of the report for a given output: `hits.txt` → `hits_report.json`.
    pub fn path_for(output_path: &Path) -> PathBuf {
        let stem = output_path
            .file_stem()
            .unwrap_or_default()
            .to_string_lossy();
        output_path.with_file_name(format!("{stem}_report.json"))
    }

    /// Writes the report as JSON next to the output and returns its path.
    pub fn write(&self, output_path: &Path) -> std::io::Result<PathBuf> {
        let report_path = Self::path_for(output_path);
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;

        std::fs::write(&report_path, json)?;
        tracing::info!("Wrote run report to {}", report_path.display());

        Ok(report_path)
    }
}
