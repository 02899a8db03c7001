use std::{
    fs::File,
    io::{self, BufRead, BufWriter},
    path::{Path, PathBuf},
};

use thiserror::Error;

use crate::{
    FileSummary, ScanSummary,
    accumulator::{GeneAccumulator, GeneStats, RankPool},
    annotation::{self, DEFAULT_HEADER_LINES, ParseErrorKind},
    merge,
    rank::{self, Mutation},
    smart_reader,
    table::{self, ReportMode},
};

/// Set `CYSTEINE_SCAN_MAX_RECORDS=N` to stop reading each input after N
/// records.
pub const MAX_RECORDS_ENV: &str = "CYSTEINE_SCAN_MAX_RECORDS";

fn max_records_from_env() -> Option<usize> {
    std::env::var(MAX_RECORDS_ENV)
        .ok()
        .and_then(|s| s.parse().ok())
}

/// Configuration required to drive a scan.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Inputs in the order they are scanned.
    pub inputs: Vec<PathBuf>,
    pub output: PathBuf,
    pub mode: ReportMode,
    pub rank_pool: RankPool,
    pub header_lines: usize,
    pub max_records: Option<usize>,
}

impl ScanConfig {
    pub fn new(inputs: Vec<PathBuf>, output: PathBuf) -> Self {
        Self {
            inputs,
            output,
            mode: ReportMode::default(),
            rank_pool: RankPool::default(),
            header_lines: DEFAULT_HEADER_LINES,
            max_records: max_records_from_env(),
        }
    }
}

/// Receives progress notifications while inputs are scanned.
pub trait ScanObserver {
    fn on_file_start(&mut self, _path: &Path) {}
    /// Called once per line after the header, parsed or not.
    fn on_record(&mut self) {}
    fn on_file_finish(&mut self, _summary: &FileSummary) {}
}

/// Observer that ignores every notification.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ScanObserver for NoProgress {}

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("failed to open input {}", path.display())]
    MissingInputFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to create output {}", path.display())]
    UnwritableOutput {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to read {} at line {line}", path.display())]
    Read {
        path: PathBuf,
        line: u64,
        #[source]
        source: io::Error,
    },
    #[error("failed to write report to {}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(
        "gene {gene} has {total_samples} total samples but qualifying mutation {mutation} \
         carries {merged_samples}"
    )]
    EmptyGeneTotal {
        gene: String,
        mutation: String,
        merged_samples: u64,
        total_samples: u64,
    },
}

/// Result of the two scan phases, before anything is written.
#[derive(Debug, Clone)]
pub struct Analysis {
    /// Sorted by ascending frequency.
    pub mutations: Vec<Mutation>,
    pub summary: ScanSummary,
}

/// Scans every input, computes the report and writes it to `config.output`.
pub fn run_scan(
    config: &ScanConfig,
    observer: &mut dyn ScanObserver,
) -> Result<ScanSummary, ScanError> {
    let inputs = open_inputs(&config.inputs)?;
    let output = File::create(&config.output).map_err(|source| ScanError::UnwritableOutput {
        path: config.output.clone(),
        source,
    })?;

    let analysis = analyze_readers(inputs, config, observer)?;

    let mut writer = BufWriter::new(output);
    table::write_table(&mut writer, &analysis.mutations, config.mode).map_err(|source| {
        ScanError::Write {
            path: config.output.clone(),
            source,
        }
    })?;

    tracing::info!(
        output = %config.output.display(),
        mutations = analysis.mutations.len(),
        "wrote report",
    );

    Ok(analysis.summary)
}

/// Runs both phases without writing a report.
pub fn analyze(
    config: &ScanConfig,
    observer: &mut dyn ScanObserver,
) -> Result<Analysis, ScanError> {
    let inputs = open_inputs(&config.inputs)?;
    analyze_readers(inputs, config, observer)
}

fn open_inputs(paths: &[PathBuf]) -> Result<Vec<(PathBuf, Box<dyn BufRead + Send>)>, ScanError> {
    paths
        .iter()
        .map(|path| {
            smart_reader::open_input(path)
                .map(|reader| (path.clone(), reader))
                .map_err(|source| ScanError::MissingInputFile {
                    path: path.clone(),
                    source,
                })
        })
        .collect()
}

fn analyze_readers(
    inputs: Vec<(PathBuf, Box<dyn BufRead + Send>)>,
    config: &ScanConfig,
    observer: &mut dyn ScanObserver,
) -> Result<Analysis, ScanError> {
    tracing::info!(
        inputs = inputs.len(),
        mode = ?config.mode,
        rank_pool = ?config.rank_pool,
        header_lines = config.header_lines,
        "starting scan",
    );

    let mut accumulator = GeneAccumulator::new(config.rank_pool);
    let mut summary = ScanSummary::default();

    for (path, reader) in inputs {
        observer.on_file_start(&path);
        let file = scan_reader(reader, &path, config, &mut accumulator, observer)?;
        observer.on_file_finish(&file);
        tracing::info!(
            input = %path.display(),
            records = file.records,
            qualifying = file.qualifying,
            malformed = file.malformed,
            "finished scanning input",
        );
        summary.add_file(file);
    }

    summary.genes = accumulator.gene_count();
    let mut mutations = score_genes(accumulator, config.mode)?;
    table::sort_by_frequency(&mut mutations);

    summary.reported_mutations = mutations.len();
    summary.merged_records = summary
        .qualifying_records
        .saturating_sub(mutations.len());

    Ok(Analysis { mutations, summary })
}

/// Phase one for a single input: feeds every record to the accumulator.
pub fn scan_reader<R>(
    reader: R,
    path: &Path,
    config: &ScanConfig,
    accumulator: &mut GeneAccumulator,
    observer: &mut dyn ScanObserver,
) -> Result<FileSummary, ScanError>
where
    R: BufRead,
{
    let mut file = FileSummary {
        path: path.to_path_buf(),
        ..FileSummary::default()
    };
    let mut records = annotation::Reader::with_header_lines(reader, config.header_lines);

    for result in records.by_ref() {
        if let Some(limit) = config.max_records
            && file.records >= limit
        {
            tracing::info!(limit, input = %path.display(), "reached max records limit, stopping read");
            break;
        }

        observer.on_record();
        match result {
            Ok(record) => {
                file.records += 1;
                if accumulator.ingest(record) {
                    file.qualifying += 1;
                }
            }
            Err(err) => match err.kind {
                ParseErrorKind::Io(source) => {
                    return Err(ScanError::Read {
                        path: path.to_path_buf(),
                        line: err.line,
                        source,
                    });
                }
                kind => {
                    file.malformed += 1;
                    tracing::warn!(
                        input = %path.display(),
                        line = err.line,
                        error = %kind,
                        "skipping malformed annotation record",
                    );
                }
            },
        }
    }

    file.lines = records.line();
    Ok(file)
}

/// Phase two: merges, scores and ranks every gene's pending mutations.
pub fn score_genes(
    accumulator: GeneAccumulator,
    mode: ReportMode,
) -> Result<Vec<Mutation>, ScanError> {
    let mut mutations = Vec::with_capacity(accumulator.qualifying_count() as usize);
    for (gene, stats) in accumulator.into_genes() {
        if stats.pending_mutations.is_empty() {
            continue;
        }
        score_gene(&gene, stats, mode, &mut mutations)?;
    }
    Ok(mutations)
}

fn score_gene(
    gene: &str,
    stats: GeneStats,
    mode: ReportMode,
    out: &mut Vec<Mutation>,
) -> Result<(), ScanError> {
    let GeneStats {
        total_samples,
        count_histogram,
        pending_mutations,
    } = stats;

    let merged = if mode.merges() {
        merge::merge_gene(pending_mutations)
    } else {
        merge::without_merging(pending_mutations)
    };

    for group in merged {
        let Some(frequency) = rank::frequency(group.sample_count, total_samples) else {
            return Err(ScanError::EmptyGeneTotal {
                gene: gene.to_string(),
                mutation: group.mutation,
                merged_samples: group.sample_count,
                total_samples,
            });
        };
        let position = match mode {
            ReportMode::Ranked => Some(rank::midpoint_rank(&count_histogram, group.sample_count)),
            ReportMode::FrequencyOnly => None,
        };
        out.push(Mutation::new(group, frequency, position));
    }

    Ok(())
}
