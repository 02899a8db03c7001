//! Frequency and midpoint rank of merged mutations within their gene.

use std::{fmt, ops::Bound};

use crate::accumulator::CountHistogram;
use crate::annotation::MutationType;
use crate::merge::MergedMutation;

/// A final reportable mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct Mutation {
    pub discovery: u64,
    pub gene: String,
    pub mutation_type: MutationType,
    pub mutation: String,
    pub sample_count: u64,
    /// Percent of the gene's total samples.
    pub frequency: f64,
    /// Absent when the report is produced without ranking.
    pub rank: Option<Rank>,
}

impl Mutation {
    pub fn new(merged: MergedMutation, frequency: f64, rank: Option<Rank>) -> Self {
        Self {
            discovery: merged.discovery,
            gene: merged.gene,
            mutation_type: merged.mutation_type,
            mutation: merged.mutation,
            sample_count: merged.sample_count,
            frequency,
            rank,
        }
    }
}

/// Position of a mutation among the records of its gene's ranking pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rank {
    pub position: u64,
    pub total: u64,
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} / {}", self.position, self.total)
    }
}

/// Percentage of `total_samples` attributable to `sample_count`.
///
/// Returns `None` when the gene total is zero, which cannot happen for a gene
/// that produced a qualifying record unless the accounting is broken.
pub fn frequency(sample_count: u64, total_samples: u64) -> Option<f64> {
    if total_samples == 0 {
        return None;
    }
    Some(sample_count as f64 / total_samples as f64 * 100.0)
}

/// Midpoint rank of `sample_count` over `histogram`.
///
/// Every pooled record with a strictly larger count places ahead; records with
/// an equal count contribute half their number, rounded down. Identical counts
/// therefore always share a rank, and a count absent from the histogram (such
/// as a merged sum) ranks just below everything larger than it.
pub fn midpoint_rank(histogram: &CountHistogram, sample_count: u64) -> Rank {
    let greater: u64 = histogram
        .range((Bound::Excluded(sample_count), Bound::Unbounded))
        .map(|(_, records)| records)
        .sum();
    let tied = histogram.get(&sample_count).copied().unwrap_or(0);
    // Even buckets add n / 2, odd buckets add (n - 1) / 2.
    let tie_offset = tied / 2;

    Rank {
        position: 1 + greater + tie_offset,
        total: histogram.values().sum(),
    }
}
