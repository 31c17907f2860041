//! Shared fixtures for the integration tests.
//!
//! Inputs are written with lopdf so the merge engine is exercised against a
//! PDF producer it does not share code with.

#![allow(dead_code)]

use lopdf::{Document, Object, Stream, dictionary};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Content stream of page `page` in fixture `tag`.
pub fn page_content(tag: &str, page: u32) -> Vec<u8> {
    format!("BT /F1 18 Tf 72 720 Td ({tag} page {page}) Tj ET").into_bytes()
}

/// A `pages`-page document with a shared font resource and one
/// uncompressed content stream per page.
pub fn sample_pdf(tag: &str, pages: u32) -> Vec<u8> {
    let mut doc = Document::with_version("1.4");
    let pages_id = doc.new_object_id();

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids = Vec::new();
    for page in 0..pages {
        let content_id = doc.add_object(Stream::new(dictionary! {}, page_content(tag, page)));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Resources" => resources_id,
            "Contents" => content_id,
        });
        kids.push(Object::Reference(page_id));
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => pages as i64,
        }),
    );

    // Reachable from the catalog only, so a merge must not copy it.
    let outline_id = doc.add_object(dictionary! { "Type" => "Outlines", "Count" => 0 });
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
        "Outlines" => outline_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).expect("failed to write fixture");
    bytes
}

/// Same as [`sample_pdf`], with Flate-compressed content streams.
pub fn compressed_pdf(tag: &str, pages: u32) -> Vec<u8> {
    let mut doc = Document::load_mem(&sample_pdf(tag, pages)).expect("fixture reloads");
    doc.compress();
    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).expect("failed to write fixture");
    bytes
}

/// A document whose trailer names an encryption dictionary.
pub fn encrypted_pdf() -> Vec<u8> {
    let mut doc = Document::load_mem(&sample_pdf("locked", 1)).expect("fixture reloads");
    let encrypt_id = doc.add_object(dictionary! {
        "Filter" => "Standard",
        "V" => 1,
        "R" => 2,
    });
    doc.trailer.set("Encrypt", encrypt_id);
    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).expect("failed to write fixture");
    bytes
}

/// Bytes that start like a PDF and then stop making sense.
pub fn corrupted_pdf() -> Vec<u8> {
    b"%PDF-1.4\n1 0 obj\n<< /Type /Catalog /Pages 2 0 R\nstartxref\n999999\n%%EOF\n".to_vec()
}

/// Decoded content of every page of `bytes`, in page order.
pub fn page_contents(bytes: &[u8]) -> Vec<Vec<u8>> {
    let doc = Document::load_mem(bytes).expect("output should be readable by lopdf");
    doc.get_pages()
        .values()
        .map(|id| doc.get_page_content(*id).expect("page content"))
        .collect()
}

/// Page count as seen by lopdf.
pub fn page_count(bytes: &[u8]) -> usize {
    Document::load_mem(bytes)
        .expect("output should be readable by lopdf")
        .get_pages()
        .len()
}

/// Write `bytes` to `dir/name` and return the path.
pub fn write_file(dir: &TempDir, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, bytes).expect("failed to write fixture file");
    path
}

/// Write `count` sample documents of `pages` pages each.
pub fn write_samples(dir: &TempDir, count: usize, pages: u32) -> Vec<PathBuf> {
    (0..count)
        .map(|i| {
            let tag = format!("doc{i}");
            write_file(dir, &format!("{tag}.pdf"), &sample_pdf(&tag, pages))
        })
        .collect()
}

/// Whether `path` holds a PDF that lopdf can open.
pub fn is_readable_pdf(path: &Path) -> bool {
    std::fs::read(path)
        .ok()
        .and_then(|bytes| Document::load_mem(&bytes).ok())
        .is_some()
}
