//! Integration tests for the file and writer entry points.

use pdfmerger::config::{CompressionLevel, MergeOptions};
use pdfmerger::io::{
    PdfReader, merge_files_to_path, merge_files_to_writer, merge_to_path, read_inputs,
};
use pdfmerger::merge::PdfMerger;
use std::io::Cursor;
use tempfile::TempDir;

use crate::common::{
    is_readable_pdf, page_content, page_contents, page_count, sample_pdf, write_file,
    write_samples,
};

#[test]
fn test_read_inputs_skips_missing_paths() {
    let dir = TempDir::new().unwrap();
    let mut paths = write_samples(&dir, 2, 1);
    paths.insert(1, dir.path().join("missing.pdf"));
    paths.push(dir.path().to_path_buf());

    let inputs = read_inputs(&paths).unwrap();

    assert_eq!(inputs.len(), 4);
    assert!(inputs[0].is_some());
    assert!(inputs[1].is_none());
    assert!(inputs[2].is_some());
    assert!(inputs[3].is_none());
}

#[test]
fn test_merge_files_to_writer() {
    let dir = TempDir::new().unwrap();
    let paths = write_samples(&dir, 3, 1);
    let mut sink = Cursor::new(Vec::new());

    let stats = merge_files_to_writer(&PdfMerger::default(), &paths, &mut sink).unwrap();

    let bytes = sink.into_inner();
    assert_eq!(stats.total_pages, 3);
    assert_eq!(bytes.len() as u64, stats.output_size);
    assert!(bytes.starts_with(b"%PDF-1."));
    assert_eq!(page_count(&bytes), 3);
}

#[test]
fn test_merge_files_to_path_overwrites_atomically() {
    let dir = TempDir::new().unwrap();
    let paths = write_samples(&dir, 2, 2);
    let output = write_file(&dir, "merged.pdf", b"stale contents");

    let stats = merge_files_to_path(&PdfMerger::default(), &paths, &output).unwrap();

    assert_eq!(stats.total_pages, 4);
    assert!(is_readable_pdf(&output));
    assert!(!dir.path().join("merged.pdf.tmp").exists());
}

#[test]
fn test_merge_to_path_from_memory() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("merged.pdf");
    let merger = PdfMerger::new(MergeOptions::default().with_compression(CompressionLevel::None));

    merge_to_path(&merger, [sample_pdf("x", 1), sample_pdf("y", 1)], &output).unwrap();

    let bytes = std::fs::read(&output).unwrap();
    assert_eq!(
        page_contents(&bytes),
        vec![page_content("x", 0), page_content("y", 0)]
    );
}

#[tokio::test]
async fn test_reader_keeps_input_order() {
    let dir = TempDir::new().unwrap();
    let mut paths = write_samples(&dir, 4, 1);
    paths.insert(2, dir.path().join("missing.pdf"));

    let (results, stats) = PdfReader::new(3).load_all(&paths).await;

    let indices: Vec<usize> = results.iter().map(|(index, _)| *index).collect();
    assert_eq!(indices, vec![0, 1, 3, 4]);
    assert_eq!(stats.loaded, 4);
    assert_eq!(stats.missing, 1);
    assert_eq!(stats.total_pages, 4);
}

#[tokio::test]
async fn test_async_and_sync_outputs_match() {
    let dir = TempDir::new().unwrap();
    let paths = write_samples(&dir, 3, 2);
    let merger = PdfMerger::new(MergeOptions::default().with_compression(CompressionLevel::None));

    let async_output = dir.path().join("async.pdf");
    merger.merge_files_async(&paths, &async_output).await.unwrap();
    let sync_output = dir.path().join("sync.pdf");
    merge_files_to_path(&merger, &paths, &sync_output).unwrap();

    assert_eq!(
        std::fs::read(&async_output).unwrap(),
        std::fs::read(&sync_output).unwrap()
    );
}
