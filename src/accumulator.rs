//! Per-gene sample accounting.
//!
//! Every parsed record contributes to its gene's total; qualifying records are
//! additionally held back until both inputs are consumed, since frequencies
//! depend on the final totals.

use std::collections::{BTreeMap, HashMap};

use clap::ValueEnum;
use serde::Serialize;

use crate::annotation::Record;

/// Which records populate the per-gene histogram used for ranking.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, ValueEnum, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RankPool {
    /// Only qualifying records, so the rank denominator is the gene's
    /// pre-merge qualifying count.
    #[default]
    Qualifying,
    /// Every parsed record of the gene.
    AllRecords,
}

/// Sample-count value to number of records observed with that value.
pub type CountHistogram = BTreeMap<u64, u64>;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GeneStats {
    pub total_samples: u64,
    pub count_histogram: CountHistogram,
    pub pending_mutations: Vec<PendingMutation>,
}

impl GeneStats {
    /// Number of records in the ranking pool.
    pub fn ranked_records(&self) -> u64 {
        self.count_histogram.values().sum()
    }
}

/// A qualifying record awaiting merge, tagged with its global discovery index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingMutation {
    pub discovery: u64,
    pub record: Record,
}

#[derive(Debug, Default)]
pub struct GeneAccumulator {
    pool: RankPool,
    genes: HashMap<String, GeneStats>,
    discovered: u64,
}

impl GeneAccumulator {
    pub fn new(pool: RankPool) -> Self {
        Self {
            pool,
            genes: HashMap::new(),
            discovered: 0,
        }
    }

    /// Must be called once for every parsed record, qualifying or not.
    pub fn observe(&mut self, gene: &str, sample_count: u64) {
        let pool = self.pool;
        self.with_gene(gene, |stats| {
            stats.total_samples = stats.total_samples.saturating_add(sample_count);
            if pool == RankPool::AllRecords {
                *stats.count_histogram.entry(sample_count).or_insert(0) += 1;
            }
        });
    }

    /// Holds a qualifying record for the merge phase.
    pub fn enqueue(&mut self, record: Record) {
        let discovery = self.discovered;
        self.discovered += 1;

        let pool = self.pool;
        let gene = record.gene.clone();
        self.with_gene(&gene, move |stats| {
            if pool == RankPool::Qualifying {
                *stats.count_histogram.entry(record.sample_count).or_insert(0) += 1;
            }
            stats
                .pending_mutations
                .push(PendingMutation { discovery, record });
        });
    }

    /// Observes a record and, if it qualifies, enqueues it. Returns whether it
    /// qualified.
    pub fn ingest(&mut self, record: Record) -> bool {
        self.observe(&record.gene, record.sample_count);
        if record.is_qualifying() {
            self.enqueue(record);
            true
        } else {
            false
        }
    }

    pub fn get(&self, gene: &str) -> Option<&GeneStats> {
        self.genes.get(gene)
    }

    pub fn gene_count(&self) -> usize {
        self.genes.len()
    }

    pub fn qualifying_count(&self) -> u64 {
        self.discovered
    }

    /// Consumes the accumulator once both inputs are scanned.
    pub fn into_genes(self) -> HashMap<String, GeneStats> {
        self.genes
    }

    // Looks up by borrowed name so the hot path allocates only for new genes.
    fn with_gene<F>(&mut self, gene: &str, update: F)
    where
        F: FnOnce(&mut GeneStats),
    {
        match self.genes.get_mut(gene) {
            Some(stats) => update(stats),
            None => {
                let mut stats = GeneStats::default();
                update(&mut stats);
                self.genes.insert(gene.to_string(), stats);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(gene: &str, mutation: &str, count: u64, canonical: bool) -> Record {
        Record {
            gene: gene.to_string(),
            mutation: mutation.to_string(),
            sample_count: count,
            canonical,
        }
    }

    #[test]
    fn totals_include_non_qualifying_records() {
        let mut acc = GeneAccumulator::new(RankPool::Qualifying);
        assert!(acc.ingest(record("TP53", "p.C10A", 4, true)));
        assert!(!acc.ingest(record("TP53", "p.R175H", 8, true)));
        assert!(!acc.ingest(record("TP53", "p.C10A", 3, false)));

        let stats = acc.get("TP53").unwrap();
        assert_eq!(stats.total_samples, 15);
        assert_eq!(stats.pending_mutations.len(), 1);
        assert_eq!(stats.ranked_records(), 1);
        assert_eq!(stats.count_histogram.get(&4), Some(&1));
    }

    #[test]
    fn all_records_pool_counts_every_observation() {
        let mut acc = GeneAccumulator::new(RankPool::AllRecords);
        acc.ingest(record("TP53", "p.C10A", 4, true));
        acc.ingest(record("TP53", "p.R175H", 4, true));
        acc.ingest(record("TP53", "p.G12D", 1, false));

        let stats = acc.get("TP53").unwrap();
        assert_eq!(stats.count_histogram.get(&4), Some(&2));
        assert_eq!(stats.count_histogram.get(&1), Some(&1));
        assert_eq!(stats.ranked_records(), 3);
        assert_eq!(stats.pending_mutations.len(), 1);
    }

    #[test]
    fn genes_accumulate_across_inputs() {
        let mut acc = GeneAccumulator::default();
        acc.observe("BRCA1", 2);
        acc.observe("EGFR", 1);
        acc.observe("BRCA1", 5);
        assert_eq!(acc.gene_count(), 2);
        assert_eq!(acc.get("BRCA1").unwrap().total_samples, 7);
    }

    #[test]
    fn discovery_index_is_global() {
        let mut acc = GeneAccumulator::default();
        acc.ingest(record("A", "p.C1A", 1, true));
        acc.ingest(record("B", "p.C2A", 1, true));
        acc.ingest(record("A", "p.C3A", 1, true));
        let a = &acc.get("A").unwrap().pending_mutations;
        assert_eq!(a[0].discovery, 0);
        assert_eq!(a[1].discovery, 2);
        assert_eq!(acc.qualifying_count(), 3);
    }
}
