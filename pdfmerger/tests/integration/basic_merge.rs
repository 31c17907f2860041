//! Integration tests for basic PDF merging operations.

use pdfmerger::config::{CompressionLevel, MergeOptions, Metadata};
use pdfmerger::merge::{CancelToken, PdfMerger};
use pdfmerger::{Object, ResolvedDocument};
use rstest::rstest;
use tempfile::TempDir;

use crate::common::{
    compressed_pdf, page_content, page_contents, page_count, sample_pdf, write_samples,
};

fn merger(compression: CompressionLevel) -> PdfMerger {
    PdfMerger::new(MergeOptions::default().with_compression(compression))
}

#[test]
fn test_merge_five_single_page_documents() {
    let inputs: Vec<Vec<u8>> = (0..5).map(|i| sample_pdf(&format!("doc{i}"), 1)).collect();

    let merged = merger(CompressionLevel::Standard).merge(&inputs).unwrap();

    assert_eq!(merged.statistics.documents_merged, 5);
    assert_eq!(merged.statistics.total_pages, 5);
    assert_eq!(page_count(&merged.bytes), 5);
}

#[rstest]
#[case(vec![1, 1])]
#[case(vec![3, 1, 2])]
#[case(vec![7])]
fn test_page_count_is_sum_of_inputs(#[case] pages: Vec<u32>) {
    let inputs: Vec<Vec<u8>> = pages
        .iter()
        .enumerate()
        .map(|(i, &n)| sample_pdf(&format!("doc{i}"), n))
        .collect();

    let merged = merger(CompressionLevel::Standard).merge(&inputs).unwrap();

    let expected: u32 = pages.iter().sum();
    assert_eq!(merged.statistics.total_pages, expected as usize);
    assert_eq!(page_count(&merged.bytes), expected as usize);
}

#[test]
fn test_uncompressed_content_is_byte_identical() {
    let inputs = vec![sample_pdf("a", 2), sample_pdf("b", 1)];

    let merged = merger(CompressionLevel::None).merge(&inputs).unwrap();

    assert_eq!(
        page_contents(&merged.bytes),
        vec![page_content("a", 0), page_content("a", 1), page_content("b", 0)]
    );
}

#[rstest]
#[case(CompressionLevel::None)]
#[case(CompressionLevel::Standard)]
#[case(CompressionLevel::Maximum)]
fn test_pages_keep_input_order(#[case] compression: CompressionLevel) {
    let inputs = vec![
        sample_pdf("first", 1),
        compressed_pdf("second", 2),
        sample_pdf("third", 1),
    ];

    let merged = merger(compression).merge(&inputs).unwrap();

    assert_eq!(
        page_contents(&merged.bytes),
        vec![
            page_content("first", 0),
            page_content("second", 0),
            page_content("second", 1),
            page_content("third", 0),
        ]
    );
}

#[test]
fn test_output_reopens_with_own_parser() {
    let inputs = vec![sample_pdf("a", 2), sample_pdf("b", 3)];

    let merged = merger(CompressionLevel::Standard).merge(&inputs).unwrap();
    let reopened = ResolvedDocument::from_bytes(&merged.bytes, &CancelToken::new()).unwrap();

    assert_eq!(reopened.page_count(), 5);
}

#[test]
fn test_merging_merged_output() {
    let first = merger(CompressionLevel::Maximum)
        .merge([sample_pdf("a", 2), sample_pdf("b", 1)])
        .unwrap();

    // Object streams and an xref stream on the way in.
    let second = merger(CompressionLevel::None)
        .merge([first.bytes.clone(), sample_pdf("c", 1)])
        .unwrap();

    assert_eq!(second.statistics.total_pages, 4);
    assert_eq!(
        page_contents(&second.bytes),
        vec![
            page_content("a", 0),
            page_content("a", 1),
            page_content("b", 0),
            page_content("c", 0),
        ]
    );
}

#[test]
fn test_catalog_only_objects_are_not_copied() {
    let merged = merger(CompressionLevel::None)
        .merge([sample_pdf("a", 1)])
        .unwrap();
    let reopened = ResolvedDocument::from_bytes(&merged.bytes, &CancelToken::new()).unwrap();

    let outlines = reopened.objects.values().any(|object| {
        object
            .as_dict()
            .and_then(|dict| dict.get(b"Type"))
            .is_some_and(|kind| *kind == Object::Name(b"Outlines".to_vec()))
    });
    assert!(!outlines);
}

#[test]
fn test_shared_resources_copied_once() {
    let merged = merger(CompressionLevel::None)
        .merge([sample_pdf("a", 4)])
        .unwrap();

    // Catalog, page tree, four pages, four contents, one resources
    // dictionary and one font.
    assert_eq!(merged.statistics.object_count, 12);
}

#[test]
fn test_metadata_written_to_info() {
    let metadata = Metadata::new(Some("Combined".to_string()), None, None, None);
    let merger = PdfMerger::new(MergeOptions::default().with_metadata(metadata));

    let merged = merger.merge([sample_pdf("a", 1)]).unwrap();

    let doc = lopdf::Document::load_mem(&merged.bytes).unwrap();
    let info = doc.trailer.get(b"Info").and_then(|o| o.as_reference()).unwrap();
    let title = doc.get_dictionary(info).unwrap().get(b"Title").unwrap();
    assert_eq!(title.as_str().unwrap(), b"Combined");
}

#[tokio::test]
async fn test_merge_files_async() {
    let dir = TempDir::new().unwrap();
    let inputs = write_samples(&dir, 3, 2);
    let output = dir.path().join("merged.pdf");

    let stats = merger(CompressionLevel::Standard)
        .merge_files_async(&inputs, &output)
        .await
        .unwrap();

    assert_eq!(stats.documents_merged, 3);
    assert_eq!(stats.total_pages, 6);
    let bytes = std::fs::read(&output).unwrap();
    assert_eq!(bytes.len() as u64, stats.output_size);
    assert_eq!(page_count(&bytes), 6);
}
