//! Document information dictionary for the merged output.
//!
//! This module builds the `/Info` dictionary from [`Metadata`]:
//! - Title, Author, Subject, Keywords
//! - Creator, Producer
//! - Creation and modification dates

use chrono::{DateTime, Utc};

use crate::config::Metadata;
use crate::object::{Dictionary, Object, PdfString};

/// Name written as Creator and Producer.
pub const PRODUCER: &str = concat!("pdfmerger ", env!("CARGO_PKG_VERSION"));

/// Builder for the Info dictionary.
pub struct MetadataManager;

impl MetadataManager {
    /// Create a new metadata manager.
    pub fn new() -> Self {
        Self
    }

    /// Build the Info dictionary, or `None` when no field is set.
    ///
    /// # Examples
    ///
    /// ```
    /// # use pdfmerger::config::Metadata;
    /// # use pdfmerger::merge::metadata::MetadataManager;
    /// let metadata = Metadata::new(Some("Report".to_string()), None, None, None);
    /// let info = MetadataManager::new().info_dictionary(&metadata).unwrap();
    /// assert!(info.has(b"Title"));
    /// assert!(info.has(b"Producer"));
    /// ```
    pub fn info_dictionary(&self, metadata: &Metadata) -> Option<Dictionary> {
        self.info_dictionary_at(metadata, Utc::now())
    }

    fn info_dictionary_at(&self, metadata: &Metadata, now: DateTime<Utc>) -> Option<Dictionary> {
        if metadata.is_empty() {
            return None;
        }

        let mut info = Dictionary::new();
        let fields = [
            ("Title", &metadata.title),
            ("Author", &metadata.author),
            ("Subject", &metadata.subject),
            ("Keywords", &metadata.keywords),
        ];
        for (key, value) in fields {
            if let Some(value) = value {
                info.set(key, text_string(value));
            }
        }

        info.set("Creator", text_string(PRODUCER));
        info.set("Producer", text_string(PRODUCER));

        let date = format_pdf_date(now);
        info.set("CreationDate", text_string(&date));
        info.set("ModDate", text_string(&date));

        Some(info)
    }

    /// Read metadata back from an Info dictionary.
    pub fn read_metadata(&self, info: &Dictionary) -> Metadata {
        let field = |key: &[u8]| match info.get(key) {
            Some(Object::String(s)) => decode_text_string(&s.bytes),
            _ => None,
        };
        Metadata::new(
            field(b"Title"),
            field(b"Author"),
            field(b"Subject"),
            field(b"Keywords"),
        )
    }
}

impl Default for MetadataManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Encode a PDF text string: ASCII stays a literal string, anything else
/// becomes UTF-16BE with a byte order mark.
pub fn text_string(value: &str) -> Object {
    if value.is_ascii() {
        return Object::String(PdfString::literal(value));
    }
    let mut bytes = vec![0xfe, 0xff];
    for unit in value.encode_utf16() {
        bytes.extend_from_slice(&unit.to_be_bytes());
    }
    Object::String(PdfString::hex(bytes))
}

/// Decode a PDF text string written as UTF-16BE (with BOM) or as
/// single-byte text.
pub fn decode_text_string(bytes: &[u8]) -> Option<String> {
    if let Some(utf16) = bytes.strip_prefix(&[0xfe, 0xff]) {
        let units: Vec<u16> = utf16
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16(&units).ok();
    }
    Some(bytes.iter().map(|&b| char::from(b)).collect())
}

/// Format a UTC timestamp as a PDF date string: `D:YYYYMMDDHHmmSSZ`.
pub fn format_pdf_date(time: DateTime<Utc>) -> String {
    time.format("D:%Y%m%d%H%M%SZ").to_string()
}
