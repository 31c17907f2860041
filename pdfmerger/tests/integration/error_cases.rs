//! Integration tests for error handling and edge cases.

use pdfmerger::config::{EmptyInput, ErrorMode, MergeOptions};
use pdfmerger::error::PdfMergeError;
use pdfmerger::merge::{CancelToken, PdfMerger};
use rstest::rstest;
use tempfile::TempDir;

use crate::common::{
    corrupted_pdf, encrypted_pdf, page_content, page_contents, sample_pdf, write_file,
    write_samples,
};

fn merger(error_mode: ErrorMode) -> PdfMerger {
    PdfMerger::new(MergeOptions::default().with_error_mode(error_mode))
}

#[test]
fn test_lenient_skips_corrupted_document() {
    let inputs = vec![sample_pdf("a", 1), corrupted_pdf(), sample_pdf("c", 1)];

    let merged = merger(ErrorMode::Lenient).merge(&inputs).unwrap();

    assert_eq!(merged.statistics.documents_merged, 2);
    assert_eq!(merged.statistics.documents_skipped, 1);
    assert_eq!(merged.statistics.skipped[0].index, 1);
    assert_eq!(
        page_contents(&merged.bytes),
        vec![page_content("a", 0), page_content("c", 0)]
    );
}

#[test]
fn test_strict_names_corrupted_document() {
    let inputs = vec![sample_pdf("a", 1), sample_pdf("b", 1), corrupted_pdf()];

    let err = merger(ErrorMode::Strict).merge(&inputs).unwrap_err();

    assert!(err.is_recoverable());
    assert_eq!(err.document_index(), Some(2));
    assert!(err.to_string().contains("document #2"));
}

#[rstest]
#[case(b"".to_vec())]
#[case(b"not a pdf at all".to_vec())]
#[case(b"%PDF-1.7\n".to_vec())]
fn test_garbage_is_rejected_in_strict_mode(#[case] input: Vec<u8>) {
    // Empty inputs are filtered out before parsing.
    let inputs = vec![sample_pdf("a", 1), input.clone()];
    let result = merger(ErrorMode::Strict).merge(&inputs);

    if input.is_empty() {
        assert_eq!(result.unwrap().statistics.documents_merged, 1);
    } else {
        assert_eq!(result.unwrap_err().document_index(), Some(1));
    }
}

#[test]
fn test_encrypted_document() {
    let inputs = vec![encrypted_pdf()];

    let err = merger(ErrorMode::Strict).merge(&inputs).unwrap_err();
    assert!(matches!(
        err,
        PdfMergeError::EncryptedDocument { document: Some(0) }
    ));

    let err = merger(ErrorMode::Lenient).merge(&inputs).unwrap_err();
    assert!(matches!(err, PdfMergeError::NoContent));
}

#[rstest]
#[case(ErrorMode::Lenient)]
#[case(ErrorMode::Strict)]
fn test_empty_input_list(#[case] error_mode: ErrorMode) {
    let inputs: Vec<Vec<u8>> = Vec::new();

    let err = merger(error_mode).merge(&inputs).unwrap_err();
    assert!(matches!(err, PdfMergeError::NoContent));
    assert_eq!(err.exit_code(), 1);
}

#[test]
fn test_empty_input_as_empty_document() {
    let merger = PdfMerger::new(MergeOptions::default().with_empty_input(EmptyInput::EmptyDocument));

    let merged = merger.merge([Vec::<u8>::new(), Vec::new()]).unwrap();

    assert_eq!(merged.statistics.total_pages, 0);
    let doc = lopdf::Document::load_mem(&merged.bytes).unwrap();
    assert!(doc.get_pages().is_empty());
}

#[test]
fn test_missing_sources_are_skipped() {
    let inputs = vec![None, Some(sample_pdf("b", 1)), None];

    let merged = merger(ErrorMode::Strict).merge(&inputs).unwrap();

    assert_eq!(merged.statistics.documents_merged, 1);
    assert_eq!(page_contents(&merged.bytes), vec![page_content("b", 0)]);
}

#[test]
fn test_cancelled_before_merge() {
    let cancel = CancelToken::new();
    cancel.cancel();
    let merger = PdfMerger::default().with_cancel_token(cancel);

    let err = merger.merge([sample_pdf("a", 1)]).unwrap_err();
    assert!(matches!(err, PdfMergeError::Cancelled));
    assert_eq!(err.exit_code(), 130);
}

#[tokio::test]
async fn test_cancelled_file_merge_leaves_no_output() {
    let dir = TempDir::new().unwrap();
    let inputs = write_samples(&dir, 2, 1);
    let output = dir.path().join("merged.pdf");

    let cancel = CancelToken::new();
    cancel.cancel();
    let merger = PdfMerger::default().with_cancel_token(cancel);

    let result = merger.merge_files_async(&inputs, &output).await;
    assert!(matches!(result, Err(PdfMergeError::Cancelled)));
    assert!(!output.exists());
}

#[tokio::test]
async fn test_nonexistent_file_is_skipped() {
    let dir = TempDir::new().unwrap();
    let good = write_file(&dir, "good.pdf", &sample_pdf("good", 1));
    let output = dir.path().join("merged.pdf");

    let stats = merger(ErrorMode::Strict)
        .merge_files_async(&[dir.path().join("missing.pdf"), good], &output)
        .await
        .unwrap();

    assert_eq!(stats.documents_merged, 1);
    assert!(output.exists());
}

#[tokio::test]
async fn test_corrupted_file_in_strict_mode_leaves_no_output() {
    let dir = TempDir::new().unwrap();
    let inputs = vec![
        write_file(&dir, "good.pdf", &sample_pdf("good", 1)),
        write_file(&dir, "bad.pdf", &corrupted_pdf()),
    ];
    let output = dir.path().join("merged.pdf");

    let err = merger(ErrorMode::Strict)
        .merge_files_async(&inputs, &output)
        .await
        .unwrap_err();

    assert_eq!(err.document_index(), Some(1));
    assert_eq!(err.exit_code(), 3);
    assert!(!output.exists());
}

#[test]
fn test_zero_jobs_rejected() {
    let merger = PdfMerger::new(MergeOptions::default().with_jobs(0));
    let err = merger.merge([sample_pdf("a", 1)]).unwrap_err();
    assert!(matches!(err, PdfMergeError::InvalidConfig { .. }));
}

#[rstest]
#[case(ErrorMode::Lenient)]
#[case(ErrorMode::Strict)]
fn test_corrupted_header(#[case] error_mode: ErrorMode) {
    let mut broken = sample_pdf("b", 1);
    broken[..8].copy_from_slice(b"GARBAGE!");
    let inputs = vec![sample_pdf("a", 2), broken, sample_pdf("c", 1)];

    let result = merger(error_mode).merge(&inputs);

    match error_mode {
        ErrorMode::Lenient => {
            let merged = result.unwrap();
            assert_eq!(merged.statistics.total_pages, 3);
            assert_eq!(merged.statistics.skipped[0].index, 1);
        }
        ErrorMode::Strict => {
            let err = result.unwrap_err();
            assert!(matches!(
                err,
                PdfMergeError::MalformedObject {
                    document: Some(1),
                    ..
                }
            ));
        }
    }
}
