use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::{EnvFilter, fmt};

use crate::{
    FileSummary, RankPool, ReportMode, ScanConfig, ScanObserver, ScanSummary,
    annotation::DEFAULT_HEADER_LINES, report::RunReport, run_scan,
};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Rank cysteine-loss mutations by per-gene sample frequency",
    long_about = None
)]
struct Cli {
    /// First COSMIC annotation VCF (scanned second)
    #[arg(value_name = "INPUT1")]
    input1: PathBuf,

    /// Second COSMIC annotation VCF (scanned first)
    #[arg(value_name = "INPUT2")]
    input2: PathBuf,

    /// Output report path
    #[arg(value_name = "OUTPUT")]
    output: PathBuf,

    /// Report one row per qualifying record without merging or ranking
    #[arg(long)]
    frequency_only: bool,

    /// Records that form the per-gene ranking pool
    #[arg(long, value_enum, default_value_t = RankPool::Qualifying)]
    rank_pool: RankPool,

    /// Header lines to skip at the top of each input
    #[arg(long, default_value_t = DEFAULT_HEADER_LINES)]
    header_lines: usize,

    /// Write a JSON run report next to the output
    #[arg(long)]
    report: bool,

    /// Disable the progress spinner
    #[arg(long)]
    no_progress: bool,

    /// Logging verbosity (e.g. error, warn, info, debug)
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Cli {
    fn scan_config(&self) -> ScanConfig {
        let mut config = ScanConfig::new(
            vec![self.input2.clone(), self.input1.clone()],
            self.output.clone(),
        );
        config.mode = if self.frequency_only {
            ReportMode::FrequencyOnly
        } else {
            ReportMode::Ranked
        };
        config.rank_pool = self.rank_pool;
        config.header_lines = self.header_lines;
        config
    }
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    let config = cli.scan_config();
    let mut progress = SpinnerProgress::new(!cli.no_progress);
    let summary = run_scan(&config, &mut progress)
        .with_context(|| format!("failed to produce report {}", config.output.display()))?;

    if cli.report {
        RunReport::new(&config, &summary)
            .write(&config.output)
            .context("failed to write run report")?;
    }

    print_summary(&summary, &config.output);
    Ok(())
}

/// Installs the stderr subscriber. An unparsable level falls back to `info`
/// and a subscriber that is already set is kept.
fn init_logging(level: &str) {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .ok();
}

/// Drives one spinner per input file.
struct SpinnerProgress {
    enabled: bool,
    bar: Option<ProgressBar>,
}

impl SpinnerProgress {
    fn new(enabled: bool) -> Self {
        Self { enabled, bar: None }
    }
}

impl ScanObserver for SpinnerProgress {
    fn on_file_start(&mut self, path: &Path) {
        let bar = if self.enabled {
            let bar = ProgressBar::new_spinner();
            bar.set_style(
                ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] {msg} {human_pos} records ({per_sec})")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner()),
            );
            bar.set_message(format!("Scanning {}", path.display()));
            bar.enable_steady_tick(Duration::from_millis(100));
            bar
        } else {
            ProgressBar::hidden()
        };
        self.bar = Some(bar);
    }

    fn on_record(&mut self) {
        if let Some(bar) = &self.bar {
            bar.inc(1);
        }
    }

    fn on_file_finish(&mut self, summary: &FileSummary) {
        if let Some(bar) = self.bar.take() {
            bar.finish_with_message(format!("Scanned {}", summary.path.display()));
        }
    }
}

fn print_summary(summary: &ScanSummary, output: &Path) {
    for file in &summary.files {
        println!(
            "Scanning {path} done: {records} records, {qualifying} cysteine-loss mutations.",
            path = file.path.display(),
            records = file.records,
            qualifying = file.qualifying,
        );
    }

    if summary.merged_records > 0 {
        println!(
            "Merged {merged} records sharing a residue into {reported} mutations.",
            merged = summary.merged_records,
            reported = summary.reported_mutations,
        );
    }

    if summary.malformed_records > 0 {
        println!(
            "Ignored {count} malformed input lines.",
            count = summary.malformed_records
        );
    }

    println!("Output written to {}.", output.display());
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn logging_setup_tolerates_repeats_and_bad_levels() {
        init_logging("debug");
        init_logging("not[a(filter");
        tracing::info!("subscriber still usable");
    }

    #[test]
    fn positional_inputs_scan_second_file_first() {
        let cli = Cli::parse_from(["cysteine_scan", "coding.vcf", "noncoding.vcf", "out.txt"]);
        let config = cli.scan_config();
        assert_eq!(
            config.inputs,
            vec![PathBuf::from("noncoding.vcf"), PathBuf::from("coding.vcf")]
        );
        assert_eq!(config.output, PathBuf::from("out.txt"));
        assert_eq!(config.mode, ReportMode::Ranked);
        assert_eq!(config.header_lines, DEFAULT_HEADER_LINES);
    }

    #[test]
    fn frequency_only_and_rank_pool_flags() {
        let cli = Cli::parse_from([
            "cysteine_scan",
            "a.vcf",
            "b.vcf",
            "out.txt",
            "--frequency-only",
            "--rank-pool",
            "all-records",
            "--header-lines",
            "0",
        ]);
        let config = cli.scan_config();
        assert_eq!(config.mode, ReportMode::FrequencyOnly);
        assert_eq!(config.rank_pool, RankPool::AllRecords);
        assert_eq!(config.header_lines, 0);
    }

    #[test]
    fn missing_output_is_a_usage_error() {
        let err = Cli::try_parse_from(["cysteine_scan", "a.vcf", "b.vcf"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }
}
