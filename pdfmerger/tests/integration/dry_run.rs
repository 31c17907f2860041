//! Integration tests for dry-run validation.

use pdfmerger::config::{Config, ErrorMode, MergeOptions, OverwriteMode};
use pdfmerger::document::XrefKind;
use pdfmerger::error::PdfMergeError;
use pdfmerger::validation::Validator;
use std::path::PathBuf;
use tempfile::TempDir;

use crate::common::{corrupted_pdf, is_readable_pdf, sample_pdf, write_file, write_samples};

fn dry_run_config(inputs: Vec<PathBuf>, output: PathBuf, error_mode: ErrorMode) -> Config {
    Config {
        inputs,
        output,
        dry_run: true,
        verbose: false,
        quiet: true,
        overwrite_mode: OverwriteMode::Force,
        json: false,
        merge: MergeOptions::default().with_error_mode(error_mode),
    }
}

#[tokio::test]
async fn test_dry_run_reports_every_document() {
    let dir = TempDir::new().unwrap();
    let inputs = write_samples(&dir, 3, 2);
    let output = dir.path().join("merged.pdf");
    let config = dry_run_config(inputs.clone(), output.clone(), ErrorMode::Lenient);

    let summary = Validator::from_options(&config.merge)
        .validate_config(&config)
        .await
        .unwrap();

    assert_eq!(summary.documents_validated(), 3);
    assert_eq!(summary.total_pages, 6);
    for (index, document) in summary.documents.iter().enumerate() {
        assert_eq!(document.index, index);
        assert_eq!(document.path.as_ref(), Some(&inputs[index]));
        assert_eq!(document.page_count, 2);
        assert_eq!(document.xref_kind, XrefKind::Table);
        // Catalog, page tree and outlines are not reachable from pages.
        assert!(document.reachable_objects < document.object_count);
    }
    assert!(!output.exists());
}

#[tokio::test]
async fn test_dry_run_lists_failed_and_missing() {
    let dir = TempDir::new().unwrap();
    let inputs = vec![
        write_file(&dir, "good.pdf", &sample_pdf("good", 1)),
        write_file(&dir, "bad.pdf", &corrupted_pdf()),
        dir.path().join("missing.pdf"),
    ];
    let config = dry_run_config(inputs, dir.path().join("out.pdf"), ErrorMode::Lenient);

    let summary = Validator::from_options(&config.merge)
        .validate_config(&config)
        .await
        .unwrap();

    assert_eq!(summary.documents_validated(), 1);
    assert_eq!(summary.documents_failed(), 1);
    assert_eq!(summary.failed[0].index, 1);
    assert_eq!(summary.missing, vec![dir.path().join("missing.pdf")]);
}

#[tokio::test]
async fn test_dry_run_strict_fails_on_bad_document() {
    let dir = TempDir::new().unwrap();
    let inputs = vec![
        write_file(&dir, "good.pdf", &sample_pdf("good", 1)),
        write_file(&dir, "bad.pdf", &corrupted_pdf()),
    ];
    let config = dry_run_config(inputs, dir.path().join("out.pdf"), ErrorMode::Strict);

    let err = Validator::from_options(&config.merge)
        .validate_config(&config)
        .await
        .unwrap_err();

    assert_eq!(err.document_index(), Some(1));
}

#[tokio::test]
async fn test_dry_run_without_usable_input() {
    let dir = TempDir::new().unwrap();
    let config = dry_run_config(
        vec![dir.path().join("missing.pdf")],
        dir.path().join("out.pdf"),
        ErrorMode::Lenient,
    );

    let err = Validator::from_options(&config.merge)
        .validate_config(&config)
        .await
        .unwrap_err();

    assert!(matches!(err, PdfMergeError::NoContent));
}

#[tokio::test]
async fn test_dry_run_no_clobber_existing_output() {
    let dir = TempDir::new().unwrap();
    let inputs = write_samples(&dir, 1, 1);
    let output = write_file(&dir, "out.pdf", &sample_pdf("old", 1));
    let mut config = dry_run_config(inputs, output.clone(), ErrorMode::Lenient);
    config.overwrite_mode = OverwriteMode::NoClobber;

    let err = Validator::new().validate_config(&config).await.unwrap_err();

    assert!(matches!(err, PdfMergeError::OutputExists { .. }));
    assert!(is_readable_pdf(&output));
}

#[tokio::test]
async fn test_dry_run_output_directory_missing() {
    let dir = TempDir::new().unwrap();
    let inputs = write_samples(&dir, 1, 1);
    let config = dry_run_config(
        inputs,
        dir.path().join("no/such/dir/out.pdf"),
        ErrorMode::Lenient,
    );

    assert!(Validator::new().validate_config(&config).await.is_err());
}

#[test]
fn test_validate_bytes_reports_layout() {
    let validator = Validator::new();

    let summary = validator.validate_bytes(4, &sample_pdf("a", 3)).unwrap();
    assert_eq!(summary.index, 4);
    assert_eq!(summary.page_count, 3);

    let err = validator.validate_bytes(5, &corrupted_pdf()).unwrap_err();
    assert_eq!(err.document_index(), Some(5));
}

#[tokio::test]
async fn test_summary_serializes_to_json() {
    let dir = TempDir::new().unwrap();
    let inputs = write_samples(&dir, 2, 1);

    let summary = Validator::new().validate_files(&inputs, 2).await.unwrap();
    let json = serde_json::to_value(&summary).unwrap();

    assert_eq!(json["totalPages"], 2);
    assert_eq!(json["documents"].as_array().unwrap().len(), 2);
    assert_eq!(json["documents"][0]["pageCount"], 1);
}
