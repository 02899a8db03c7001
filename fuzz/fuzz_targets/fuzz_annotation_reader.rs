#![no_main]

use libfuzzer_sys::fuzz_target;
use std::io::Cursor;

use cysteine_scan::{GeneAccumulator, ReportMode, annotation, scan::score_genes};

fuzz_target!(|data: &[u8]| {
    let cursor = Cursor::new(data);
    let reader = annotation::Reader::with_header_lines(cursor, 0);
    let mut accumulator = GeneAccumulator::default();

    // Iterate all records - should never panic
    for result in reader.take(1000) {
        match result {
            Ok(record) => {
                // Exercise Display impl and classification
                let _ = format!("{}", record);
                let _ = record.mutation_type();
                accumulator.ingest(record);
            }
            Err(_) => {
                // Parse errors are expected for random input
            }
        }
    }

    let _ = score_genes(accumulator, ReportMode::Ranked);
});
