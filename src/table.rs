use std::io::{self, Write};

use serde::Serialize;

use crate::rank::Mutation;

/// Header row of the ranked layout.
pub const RANKED_HEADER: &str = "GENE\tMUTATION\tSAMPLE COUNT\tFREQUENCY\tRANK";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReportMode {
    /// Merge same-residue records and rank them within their gene.
    #[default]
    Ranked,
    /// One row per qualifying record with frequency only, no header.
    FrequencyOnly,
}

impl ReportMode {
    pub fn merges(&self) -> bool {
        matches!(self, Self::Ranked)
    }
}

/// Orders mutations by ascending frequency. Equal frequencies keep discovery
/// order.
pub fn sort_by_frequency(mutations: &mut [Mutation]) {
    mutations.sort_by(|a, b| {
        a.frequency
            .total_cmp(&b.frequency)
            .then(a.discovery.cmp(&b.discovery))
    });
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ColumnWidths {
    pub gene: usize,
    pub mutation_type: usize,
    pub mutation: usize,
}

impl ColumnWidths {
    pub fn measure(mutations: &[Mutation]) -> Self {
        mutations.iter().fold(Self::default(), |widths, m| Self {
            gene: widths.gene.max(m.gene.chars().count()),
            mutation_type: widths.mutation_type.max(m.mutation_type.as_str().len()),
            mutation: widths.mutation.max(m.mutation.chars().count()),
        })
    }
}

/// Frequency rounded to three decimals with trailing zeros dropped, always
/// keeping a fractional part (`50.0`, `33.333`, `0.062`).
///
/// Rounding works on the exact binary value, so a stored `0.0625` is a tie
/// and goes to the even digit.
pub fn format_frequency(frequency: f64) -> String {
    if !frequency.is_finite() {
        return frequency.to_string();
    }
    let mut text = format!("{frequency:.3}");
    let significant = text.trim_end_matches('0').len();
    text.truncate(significant);
    if text.ends_with('.') {
        text.push('0');
    }
    text
}

pub fn format_row(mutation: &Mutation, widths: &ColumnWidths) -> String {
    let mut line = format!(
        "{gene:<gw$} {kind:<tw$} {name:<mw$} {count:<2} {freq:<6}%",
        gene = mutation.gene,
        kind = mutation.mutation_type.as_str(),
        name = mutation.mutation,
        count = mutation.sample_count,
        freq = format_frequency(mutation.frequency),
        gw = widths.gene,
        tw = widths.mutation_type,
        mw = widths.mutation,
    );
    if let Some(rank) = mutation.rank {
        line.push(' ');
        line.push_str(&rank.to_string());
    }
    line
}

/// Writes the report body. `mutations` must already be sorted.
pub fn write_table<W>(writer: &mut W, mutations: &[Mutation], mode: ReportMode) -> io::Result<()>
where
    W: Write,
{
    if mode == ReportMode::Ranked {
        writeln!(writer, "{RANKED_HEADER}")?;
    }
    let widths = ColumnWidths::measure(mutations);
    for mutation in mutations {
        writeln!(writer, "{}", format_row(mutation, &widths))?;
    }
    writer.flush()
}
