use std::{
    fmt,
    io::{self, BufRead},
    num::ParseIntError,
};

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

/// Number of header lines carried by a COSMIC annotation export.
pub const DEFAULT_HEADER_LINES: usize = 21;

static GENE_FIELD: Lazy<Regex> = Lazy::new(|| Regex::new(r"GENE=(.*?);").unwrap());
static AA_FIELD: Lazy<Regex> = Lazy::new(|| Regex::new(r"AA=(.*?);").unwrap());
static SAMPLE_COUNT_FIELD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"SAMPLE_COUNT=(.*?);").unwrap());
static CANONICAL_FIELD: Lazy<Regex> = Lazy::new(|| Regex::new(r"IS_CANONICAL=(.*?);").unwrap());

static CYSTEINE_LOSS: Lazy<Regex> = Lazy::new(|| Regex::new(r"p\.C").unwrap());
static DELETION: Lazy<Regex> = Lazy::new(|| Regex::new(r"p\.\w*del\w*").unwrap());
static INSERTION: Lazy<Regex> = Lazy::new(|| Regex::new(r"p\.\w*ins\w*").unwrap());
static FRAMESHIFT: Lazy<Regex> = Lazy::new(|| Regex::new(r"p\.\w*fs\w*").unwrap());
static DUPLICATION: Lazy<Regex> = Lazy::new(|| Regex::new(r"p\.\w*dup\w*").unwrap());

/// A single annotation line reduced to the fields the scan needs.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Record {
    pub gene: String,
    pub mutation: String,
    pub sample_count: u64,
    pub canonical: bool,
}

impl Record {
    /// Whether this record is a cysteine loss on the canonical transcript.
    pub fn is_qualifying(&self) -> bool {
        self.canonical && CYSTEINE_LOSS.is_match(&self.mutation)
    }

    pub fn mutation_type(&self) -> MutationType {
        MutationType::classify(&self.mutation)
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum MutationType {
    Indel,
    Frameshift,
    Duplication,
    Point,
}

impl MutationType {
    /// Classifies a protein change descriptor. Deletion/insertion markers win
    /// over frameshift, which wins over duplication.
    pub fn classify(descriptor: &str) -> Self {
        if DELETION.is_match(descriptor) || INSERTION.is_match(descriptor) {
            Self::Indel
        } else if FRAMESHIFT.is_match(descriptor) {
            Self::Frameshift
        } else if DUPLICATION.is_match(descriptor) {
            Self::Duplication
        } else {
            Self::Point
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Indel => "indel",
            Self::Frameshift => "frameshift",
            Self::Duplication => "duplication",
            Self::Point => "point",
        }
    }
}

impl fmt::Display for MutationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Iterator over annotation records in a COSMIC-style VCF text stream.
///
/// The first `header_lines` physical lines are discarded unread. Every later
/// line yields an item; a blank line is a record with no `GENE` field.
pub struct Reader<R> {
    inner: R,
    line: u64,
    header_lines: usize,
    buf: String,
}

impl<R> Reader<R>
where
    R: BufRead,
{
    pub fn new(inner: R) -> Self {
        Self::with_header_lines(inner, DEFAULT_HEADER_LINES)
    }

    pub fn with_header_lines(inner: R, header_lines: usize) -> Self {
        Self {
            inner,
            line: 0,
            header_lines,
            buf: String::new(),
        }
    }

    /// Physical line number of the most recently read line.
    pub fn line(&self) -> u64 {
        self.line
    }
}

impl<R> Iterator for Reader<R>
where
    R: BufRead,
{
    type Item = Result<Record, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            self.buf.clear();
            match self.inner.read_line(&mut self.buf) {
                Ok(0) => return None,
                Ok(_) => {
                    self.line += 1;
                    if self.line <= self.header_lines as u64 {
                        continue;
                    }
                    let trimmed = self.buf.trim_end_matches(&['\n', '\r'][..]);
                    return Some(parse_record(trimmed).map_err(|kind| ParseError {
                        line: self.line,
                        raw: trimmed.to_string(),
                        kind,
                    }));
                }
                Err(e) => {
                    return Some(Err(ParseError {
                        line: self.line + 1,
                        raw: String::new(),
                        kind: ParseErrorKind::Io(e),
                    }));
                }
            }
        }
    }
}

/// Errors that can arise while extracting an annotation record.
#[derive(Debug, Error)]
#[error("line {line}: {kind}")]
pub struct ParseError {
    pub line: u64,
    pub raw: String,
    #[source]
    pub kind: ParseErrorKind,
}

#[derive(Debug, Error)]
pub enum ParseErrorKind {
    #[error("I/O error")]
    Io(#[from] io::Error),
    #[error("missing {0} field")]
    MissingField(&'static str),
    #[error("invalid sample count: {0}")]
    InvalidSampleCount(ParseIntError),
}

fn capture<'a>(pattern: &Regex, line: &'a str) -> Option<&'a str> {
    pattern
        .captures(line)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

pub fn parse_record(line: &str) -> Result<Record, ParseErrorKind> {
    let gene = capture(&GENE_FIELD, line).ok_or(ParseErrorKind::MissingField("GENE"))?;
    let mutation = capture(&AA_FIELD, line).ok_or(ParseErrorKind::MissingField("AA"))?;
    let sample_count = capture(&SAMPLE_COUNT_FIELD, line)
        .ok_or(ParseErrorKind::MissingField("SAMPLE_COUNT"))?
        .trim()
        .parse::<u64>()
        .map_err(ParseErrorKind::InvalidSampleCount)?;
    let canonical = capture(&CANONICAL_FIELD, line) == Some("y");

    Ok(Record {
        gene: gene.to_string(),
        mutation: mutation.to_string(),
        sample_count,
        canonical,
    })
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "GENE={};AA={};SAMPLE_COUNT={};IS_CANONICAL={};",
            self.gene,
            self.mutation,
            self.sample_count,
            if self.canonical { "y" } else { "n" }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_fields_in_any_order() {
        let record = parse_record(
            "1\t100\tCOSV1\tA\tG\t.\t.\tSAMPLE_COUNT=7;IS_CANONICAL=y;GENE=TP53;STRAND=+;AA=p.C176F;",
        )
        .expect("parse");
        assert_eq!(record.gene, "TP53");
        assert_eq!(record.mutation, "p.C176F");
        assert_eq!(record.sample_count, 7);
        assert!(record.canonical);
        assert!(record.is_qualifying());
    }

    #[test]
    fn missing_canonical_flag_reads_as_no() {
        let record = parse_record("GENE=KRAS;AA=p.C12F;SAMPLE_COUNT=3;").unwrap();
        assert!(!record.canonical);
        assert!(!record.is_qualifying());
    }

    #[test]
    fn non_cysteine_change_does_not_qualify() {
        let record = parse_record("GENE=KRAS;AA=p.G12D;SAMPLE_COUNT=3;IS_CANONICAL=y;").unwrap();
        assert!(!record.is_qualifying());
    }

    #[test]
    fn missing_required_fields_are_reported() {
        let err = parse_record("GENE=KRAS;AA=p.C12F;IS_CANONICAL=y;").unwrap_err();
        assert!(matches!(err, ParseErrorKind::MissingField("SAMPLE_COUNT")));

        let err = parse_record("AA=p.C12F;SAMPLE_COUNT=1;").unwrap_err();
        assert!(matches!(err, ParseErrorKind::MissingField("GENE")));

        let err = parse_record("GENE=KRAS;SAMPLE_COUNT=1;").unwrap_err();
        assert!(matches!(err, ParseErrorKind::MissingField("AA")));
    }

    #[test]
    fn non_numeric_sample_count_is_rejected() {
        let err = parse_record("GENE=KRAS;AA=p.C12F;SAMPLE_COUNT=many;").unwrap_err();
        assert!(matches!(err, ParseErrorKind::InvalidSampleCount(_)));
    }

    #[test]
    fn classification_precedence() {
        assert_eq!(MutationType::classify("p.C53_K54del"), MutationType::Indel);
        assert_eq!(MutationType::classify("p.C53delinsW"), MutationType::Indel);
        assert_eq!(MutationType::classify("p.C53_K54insG"), MutationType::Indel);
        // Matches both the deletion and frameshift markers.
        assert_eq!(MutationType::classify("p.C53delfs*4"), MutationType::Indel);
        assert_eq!(MutationType::classify("p.C53Lfs*12"), MutationType::Frameshift);
        assert_eq!(MutationType::classify("p.C53dup"), MutationType::Duplication);
        assert_eq!(MutationType::classify("p.C53A"), MutationType::Point);
    }

    #[test]
    fn reader_skips_header_lines() {
        let mut data = String::new();
        for i in 0..3 {
            data.push_str(&format!("##header {i}\n"));
        }
        data.push_str("GENE=A;AA=p.C1A;SAMPLE_COUNT=2;IS_CANONICAL=y;\n");
        let mut reader = Reader::with_header_lines(data.as_bytes(), 3);
        let record = reader.next().unwrap().unwrap();
        assert_eq!(record.gene, "A");
        assert_eq!(reader.line(), 4);
        assert!(reader.next().is_none());
    }

    #[test]
    fn reader_reports_malformed_line_and_continues() {
        let data = b"GENE=A;AA=p.C1A;IS_CANONICAL=y;\n\nGENE=B;AA=p.C2A;SAMPLE_COUNT=5;\n";
        let mut reader = Reader::with_header_lines(&data[..], 0);
        let err = reader.next().unwrap().unwrap_err();
        assert_eq!(err.line, 1);
        assert!(err.raw.starts_with("GENE=A"));
        let blank = reader.next().unwrap().unwrap_err();
        assert_eq!(blank.line, 2);
        assert!(matches!(blank.kind, ParseErrorKind::MissingField("GENE")));
        let record = reader.next().unwrap().unwrap();
        assert_eq!(record.gene, "B");
        assert!(reader.next().is_none());
    }

    #[test]
    fn display_round_trips_through_parser() {
        let record = Record {
            gene: String::from("EGFR"),
            mutation: String::from("p.C797S"),
            sample_count: 12,
            canonical: true,
        };
        assert_eq!(parse_record(&record.to_string()).unwrap(), record);
    }
}
