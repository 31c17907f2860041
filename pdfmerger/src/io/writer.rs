//! PDF serialization and saving.
//!
//! [`PdfWriter`] turns a [`MergedDocument`] into PDF syntax, recording the
//! exact offset of every indirect object for the cross-reference section.
//! It writes either a classic `xref` table or, with
//! [`CompressionLevel::Maximum`], object streams indexed by a compressed
//! cross-reference stream.
//!
//! Saving to a path is atomic by default: the output goes to a temporary
//! file next to the destination and is renamed into place once complete.
//!
//! # Examples
//!
//! ```no_run
//! use pdfmerger::config::CompressionLevel;
//! use pdfmerger::io::writer::PdfWriter;
//! use std::path::Path;
//!
//! # async fn example(bytes: Vec<u8>) -> Result<(), Box<dyn std::error::Error>> {
//! let writer = PdfWriter::new(CompressionLevel::Standard);
//! writer.save(bytes, Path::new("output.pdf")).await?;
//! # Ok(())
//! # }
//! ```

use std::borrow::Cow;
use std::ffi::OsString;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tokio::task;

use crate::config::CompressionLevel;
use crate::document::Version;
use crate::error::{PdfMergeError, Result};
use crate::merge::merger::{MergedDocument, format_file_size};
use crate::merge::{MergeStatistics, PdfMerger, PdfSource};
use crate::object::{Dictionary, Object, PdfString, Stream, StringFormat};
use crate::parser::filters::flate_encode;
use crate::parser::lexer::is_delimiter;

/// Non-stream objects packed into one object stream.
const OBJECTS_PER_STREAM: usize = 100;

/// Options for writing PDF files.
#[derive(Debug, Clone)]
pub struct WriteOptions {
    /// Use atomic writes (write to temp file, then rename).
    pub atomic: bool,

    /// Buffer size for writing (in bytes).
    pub buffer_size: usize,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            atomic: true,
            buffer_size: 8192,
        }
    }
}

/// Statistics about a write operation.
#[derive(Debug, Clone)]
pub struct WriteStatistics {
    /// Time taken to write.
    pub write_time: Duration,

    /// Size of the written file in bytes.
    pub file_size: u64,

    /// Path where the file was written.
    pub output_path: PathBuf,
}

impl WriteStatistics {
    /// Format file size as human-readable string.
    pub fn format_file_size(&self) -> String {
        format_file_size(self.file_size)
    }
}

/// One row of the cross-reference section.
#[derive(Debug, Clone, Copy)]
enum Slot {
    Free,
    Direct(usize),
    Packed { stream: u32, index: usize },
}

/// Serializer and file writer for merged documents.
#[derive(Debug, Clone, Default)]
pub struct PdfWriter {
    compression: CompressionLevel,
    options: WriteOptions,
}

impl PdfWriter {
    /// Create a writer with atomic saves.
    pub fn new(compression: CompressionLevel) -> Self {
        Self {
            compression,
            options: WriteOptions::default(),
        }
    }

    /// Create a writer with custom file options.
    pub fn with_options(compression: CompressionLevel, options: WriteOptions) -> Self {
        Self {
            compression,
            options,
        }
    }

    /// Create a writer that writes directly to the destination.
    pub fn non_atomic(compression: CompressionLevel) -> Self {
        Self::with_options(
            compression,
            WriteOptions {
                atomic: false,
                ..WriteOptions::default()
            },
        )
    }

    /// Compression applied when serializing.
    pub fn compression(&self) -> CompressionLevel {
        self.compression
    }

    /// Serialize a merged document.
    pub fn serialize(&self, document: &MergedDocument) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        if self.compression.uses_object_streams() {
            write_header(&mut out, document.version.max(Version::V1_5));
            self.write_with_object_streams(&mut out, document)?;
        } else {
            write_header(&mut out, document.version);
            self.write_with_table(&mut out, document)?;
        }
        Ok(out)
    }

    /// Serialize a merged document into `sink`, returning the byte count.
    pub fn write_to<W: Write + ?Sized>(&self, document: &MergedDocument, sink: &mut W) -> Result<u64> {
        let bytes = self.serialize(document)?;
        sink.write_all(&bytes)?;
        sink.flush()?;
        Ok(bytes.len() as u64)
    }

    fn write_with_table(&self, out: &mut Vec<u8>, document: &MergedDocument) -> Result<()> {
        let size = document.max_object_number() as usize + 1;
        let mut slots = vec![Slot::Free; size];

        for (num, object) in &document.objects {
            slots[*num as usize] = Slot::Direct(out.len());
            self.write_indirect(out, *num, object)?;
        }

        let startxref = out.len();
        out.extend_from_slice(format!("xref\n0 {size}\n").as_bytes());
        for slot in &slots {
            match slot {
                Slot::Direct(offset) => {
                    out.extend_from_slice(format!("{offset:010} 00000 n \n").as_bytes())
                }
                _ => out.extend_from_slice(b"0000000000 65535 f \n"),
            }
        }

        let mut trailer = Dictionary::new();
        trailer.set("Size", size as i64);
        trailer.set("Root", Object::Reference((document.root, 0)));
        if let Some(info) = document.info {
            trailer.set("Info", Object::Reference((info, 0)));
        }
        out.extend_from_slice(b"trailer\n");
        write_value(out, &Object::Dictionary(trailer));
        out.extend_from_slice(format!("\nstartxref\n{startxref}\n%%EOF\n").as_bytes());
        Ok(())
    }

    fn write_with_object_streams(&self, out: &mut Vec<u8>, document: &MergedDocument) -> Result<()> {
        let mut next = document.max_object_number() + 1;
        let mut slots = vec![Slot::Free; next as usize];
        let mut packable = Vec::new();

        for (num, object) in &document.objects {
            if matches!(object, Object::Stream(_)) {
                slots[*num as usize] = Slot::Direct(out.len());
                self.write_indirect(out, *num, object)?;
            } else {
                packable.push((*num, object));
            }
        }

        for chunk in packable.chunks(OBJECTS_PER_STREAM) {
            let stream_num = next;
            next += 1;

            let mut header = String::new();
            let mut body = Vec::new();
            for (index, (num, object)) in chunk.iter().enumerate() {
                header.push_str(&format!("{num} {} ", body.len()));
                write_value(&mut body, object);
                body.push(b'\n');
                slots[*num as usize] = Slot::Packed {
                    stream: stream_num,
                    index,
                };
            }

            let mut decoded = header.into_bytes();
            let first = decoded.len();
            decoded.extend_from_slice(&body);

            let mut dict = Dictionary::new();
            dict.set("Type", Object::name("ObjStm"));
            dict.set("N", chunk.len() as i64);
            dict.set("First", first as i64);
            dict.set("Filter", Object::name("FlateDecode"));
            let content = flate_encode(&decoded, self.compression.flate_level())?;

            slots.push(Slot::Direct(out.len()));
            write_indirect_stream(out, stream_num, &Stream::new(dict, content));
        }

        let xref_num = next;
        let size = xref_num as usize + 1;
        let startxref = out.len();
        slots.push(Slot::Direct(startxref));

        let width = byte_width(startxref.max(xref_num as usize));
        let mut rows = Vec::with_capacity(size * (width + 3));
        for (num, slot) in slots.iter().enumerate() {
            let (kind, field2, field3) = match *slot {
                Slot::Free if num == 0 => (0, 0, 0xffff),
                Slot::Free => (0, 0, 0),
                Slot::Direct(offset) => (1, offset, 0),
                Slot::Packed { stream, index } => (2, stream as usize, index),
            };
            rows.push(kind);
            push_be(&mut rows, field2 as u64, width);
            push_be(&mut rows, field3 as u64, 2);
        }

        let mut dict = Dictionary::new();
        dict.set("Type", Object::name("XRef"));
        dict.set("Size", size as i64);
        dict.set(
            "W",
            vec![Object::Integer(1), Object::Integer(width as i64), Object::Integer(2)],
        );
        dict.set("Root", Object::Reference((document.root, 0)));
        if let Some(info) = document.info {
            dict.set("Info", Object::Reference((info, 0)));
        }
        dict.set("Filter", Object::name("FlateDecode"));
        let content = flate_encode(&rows, self.compression.flate_level())?;

        write_indirect_stream(out, xref_num, &Stream::new(dict, content));
        out.extend_from_slice(format!("startxref\n{startxref}\n%%EOF\n").as_bytes());
        Ok(())
    }

    fn write_indirect(&self, out: &mut Vec<u8>, num: u32, object: &Object) -> Result<()> {
        match object {
            Object::Stream(stream) => {
                let stream = self.compress_stream(stream)?;
                write_indirect_stream(out, num, &stream);
            }
            _ => {
                out.extend_from_slice(format!("{num} 0 obj\n").as_bytes());
                write_value(out, object);
                out.extend_from_slice(b"\nendobj\n");
            }
        }
        Ok(())
    }

    /// Flate-compress a stream that has no filter yet, when that saves space.
    fn compress_stream<'a>(&self, stream: &'a Stream) -> Result<Cow<'a, Stream>> {
        if !self.compression.compresses_streams()
            || stream.is_filtered()
            || stream.dict.has(b"DecodeParms")
            || stream.content.is_empty()
        {
            return Ok(Cow::Borrowed(stream));
        }

        let compressed = flate_encode(&stream.content, self.compression.flate_level())?;
        if compressed.len() >= stream.content.len() {
            return Ok(Cow::Borrowed(stream));
        }

        let mut dict = stream.dict.clone();
        dict.set("Filter", Object::name("FlateDecode"));
        Ok(Cow::Owned(Stream::new(dict, compressed)))
    }

    /// Write bytes to `path` on the current thread.
    pub fn write_file(&self, bytes: &[u8], path: &Path) -> Result<WriteStatistics> {
        write_file(bytes, path, &self.options)
    }

    /// Write bytes to `path` on a blocking worker.
    ///
    /// # Errors
    ///
    /// Returns an error if the temporary file cannot be created or written,
    /// or if it cannot be renamed into place.
    pub async fn save(&self, bytes: Vec<u8>, path: &Path) -> Result<WriteStatistics> {
        let path_buf = path.to_path_buf();
        let options = self.options.clone();

        task::spawn_blocking(move || write_file(&bytes, &path_buf, &options))
            .await
            .map_err(|e| PdfMergeError::io_at(path, std::io::Error::other(e)))?
    }

    /// Check if we can write to the output path.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Parent directory doesn't exist
    /// - Parent directory is not writable
    pub async fn can_write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if !parent.exists() {
                return Err(PdfMergeError::invalid_config(format!(
                    "Output directory does not exist: {}",
                    parent.display()
                )));
            }

            let metadata = tokio::fs::metadata(parent)
                .await
                .map_err(|e| PdfMergeError::io_at(parent, e))?;

            if metadata.permissions().readonly() {
                return Err(PdfMergeError::invalid_config(format!(
                    "Output directory is not writable: {}",
                    parent.display()
                )));
            }
        }

        Ok(())
    }

    /// Check if output file exists.
    pub async fn exists(&self, path: &Path) -> bool {
        tokio::fs::metadata(path).await.is_ok()
    }

    /// Safely remove an output file if it exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be removed.
    pub async fn remove_if_exists(&self, path: &Path) -> Result<()> {
        if self.exists(path).await {
            tokio::fs::remove_file(path)
                .await
                .map_err(|e| PdfMergeError::io_at(path, e))?;
        }
        Ok(())
    }
}

/// Merge in-memory documents and save the result atomically at `path`.
pub fn merge_to_path<I, S>(merger: &PdfMerger, inputs: I, path: &Path) -> Result<MergeStatistics>
where
    I: IntoIterator<Item = S>,
    S: PdfSource,
{
    let merged = merger.merge(inputs)?;
    PdfWriter::new(merger.options().compression).write_file(&merged.bytes, path)?;
    Ok(merged.statistics)
}

fn write_file(bytes: &[u8], path: &Path, options: &WriteOptions) -> Result<WriteStatistics> {
    let start = Instant::now();

    let write_path = if options.atomic {
        temp_path(path)
    } else {
        path.to_path_buf()
    };

    let written = (|| -> std::io::Result<()> {
        let file = std::fs::File::create(&write_path)?;
        let mut writer = std::io::BufWriter::with_capacity(options.buffer_size, file);
        writer.write_all(bytes)?;
        writer.flush()?;
        writer.get_ref().sync_all()
    })();

    if let Err(e) = written {
        if options.atomic {
            let _ = std::fs::remove_file(&write_path);
        }
        return Err(PdfMergeError::io_at(&write_path, e));
    }

    if options.atomic {
        std::fs::rename(&write_path, path).map_err(|e| {
            let _ = std::fs::remove_file(&write_path);
            PdfMergeError::io_at(path, e)
        })?;
    }

    Ok(WriteStatistics {
        write_time: start.elapsed(),
        file_size: bytes.len() as u64,
        output_path: path.to_path_buf(),
    })
}

/// `out.pdf` becomes `out.pdf.tmp` in the same directory.
fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(OsString::from)
        .unwrap_or_else(|| OsString::from("output"));
    name.push(".tmp");
    path.with_file_name(name)
}

fn write_header(out: &mut Vec<u8>, version: Version) {
    out.extend_from_slice(format!("%PDF-{version}\n").as_bytes());
    out.extend_from_slice(b"%\xe2\xe3\xcf\xd3\n");
}

fn write_indirect_stream(out: &mut Vec<u8>, num: u32, stream: &Stream) {
    out.extend_from_slice(format!("{num} 0 obj\n").as_bytes());
    write_stream(out, stream);
    out.extend_from_slice(b"\nendobj\n");
}

/// Dictionary, then the raw body. `/Length` always matches the body.
fn write_stream(out: &mut Vec<u8>, stream: &Stream) {
    out.extend_from_slice(b"<<");
    for (key, value) in stream.dict.iter().filter(|(key, _)| key.as_slice() != b"Length") {
        out.push(b' ');
        write_name(out, key);
        out.push(b' ');
        write_value(out, value);
    }
    out.extend_from_slice(format!(" /Length {} >>\nstream\n", stream.content.len()).as_bytes());
    out.extend_from_slice(&stream.content);
    out.extend_from_slice(b"\nendstream");
}

/// Append the PDF syntax of a direct object.
pub fn write_value(out: &mut Vec<u8>, object: &Object) {
    match object {
        Object::Null => out.extend_from_slice(b"null"),
        Object::Boolean(value) => out.extend_from_slice(if *value { b"true".as_slice() } else { b"false" }),
        Object::Integer(value) => out.extend_from_slice(value.to_string().as_bytes()),
        Object::Real(value) => out.extend_from_slice(format_real(*value).as_bytes()),
        Object::String(s) => write_string(out, s),
        Object::Name(name) => write_name(out, name),
        Object::Array(items) => {
            out.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(b' ');
                }
                write_value(out, item);
            }
            out.push(b']');
        }
        Object::Dictionary(dict) => {
            out.extend_from_slice(b"<<");
            for (key, value) in dict.iter() {
                out.push(b' ');
                write_name(out, key);
                out.push(b' ');
                write_value(out, value);
            }
            out.extend_from_slice(b" >>");
        }
        Object::Stream(stream) => write_stream(out, stream),
        Object::Reference((num, generation)) => {
            out.extend_from_slice(format!("{num} {generation} R").as_bytes())
        }
    }
}

/// Reals always carry a decimal point so they read back as reals.
fn format_real(value: f64) -> String {
    if !value.is_finite() {
        return "0.0".to_string();
    }
    let mut text = value.to_string();
    if !text.contains('.') {
        text.push_str(".0");
    }
    text
}

fn write_name(out: &mut Vec<u8>, name: &[u8]) {
    out.push(b'/');
    for &byte in name {
        if !(0x21..=0x7e).contains(&byte) || byte == b'#' || is_delimiter(byte) {
            out.extend_from_slice(format!("#{byte:02X}").as_bytes());
        } else {
            out.push(byte);
        }
    }
}

fn write_string(out: &mut Vec<u8>, s: &PdfString) {
    match s.format {
        StringFormat::Literal => {
            out.push(b'(');
            for &byte in &s.bytes {
                match byte {
                    b'(' | b')' | b'\\' => {
                        out.push(b'\\');
                        out.push(byte);
                    }
                    b'\r' => out.extend_from_slice(b"\\r"),
                    _ => out.push(byte),
                }
            }
            out.push(b')');
        }
        StringFormat::Hexadecimal => {
            out.push(b'<');
            for byte in &s.bytes {
                out.extend_from_slice(format!("{byte:02X}").as_bytes());
            }
            out.push(b'>');
        }
    }
}

/// Bytes needed to store `value` big-endian, at least one.
fn byte_width(value: usize) -> usize {
    let bits = usize::BITS - value.leading_zeros();
    (bits as usize).div_ceil(8).max(1)
}

fn push_be(out: &mut Vec<u8>, value: u64, width: usize) {
    out.extend_from_slice(&value.to_be_bytes()[8 - width..]);
}
