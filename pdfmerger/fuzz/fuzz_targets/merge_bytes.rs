#![no_main]

use libfuzzer_sys::fuzz_target;
use pdfmerger::config::{CompressionLevel, ErrorMode, MergeOptions};
use pdfmerger::PdfMerger;

// Arbitrary bytes, split on a marker into several documents, must never
// panic. Whatever merges must parse again.
fuzz_target!(|data: &[u8]| {
    let inputs: Vec<&[u8]> = data.split(|&b| b == 0xff).collect();
    let merger = PdfMerger::new(
        MergeOptions::default()
            .with_error_mode(ErrorMode::Lenient)
            .with_compression(CompressionLevel::None)
            .with_jobs(1),
    );

    if let Ok(merged) = merger.merge(&inputs) {
        let reopened = pdfmerger::ResolvedDocument::from_bytes(
            &merged.bytes,
            &pdfmerger::CancelToken::new(),
        );
        assert!(reopened.is_ok());
    }
});
