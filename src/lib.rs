#![doc = include_str!("../README.md")]

use std::path::PathBuf;

use serde::Serialize;

pub mod accumulator;
pub mod annotation;
pub mod cli;
pub mod merge;
pub mod rank;
pub mod report;
pub mod scan;
pub mod smart_reader;
pub mod table;

pub use accumulator::{GeneAccumulator, GeneStats, RankPool};
pub use annotation::{MutationType, Record};
pub use rank::{Mutation, Rank};
pub use scan::{Analysis, NoProgress, ScanConfig, ScanError, ScanObserver, analyze, run_scan};
pub use table::ReportMode;

/// Counters for one scanned input.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FileSummary {
    pub path: PathBuf,
    /// Physical lines read, header included.
    pub lines: u64,
    pub records: usize,
    pub malformed: usize,
    pub qualifying: usize,
}

/// Summary statistics gathered across a whole scan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScanSummary {
    pub files: Vec<FileSummary>,
    pub total_records: usize,
    pub malformed_records: usize,
    pub qualifying_records: usize,
    pub genes: usize,
    pub reported_mutations: usize,
    /// Qualifying records folded into another record's merge group.
    pub merged_records: usize,
}

impl ScanSummary {
    pub fn add_file(&mut self, file: FileSummary) {
        self.total_records += file.records;
        self.malformed_records += file.malformed;
        self.qualifying_records += file.qualifying;
        self.files.push(file);
    }
}
