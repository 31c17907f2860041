//! Cross-reference data.
//!
//! Locates `startxref`, then walks the chain of cross-reference sections
//! (classic `xref` tables and `/Type /XRef` streams, linked by `/Prev` and
//! `/XRefStm`) from newest to oldest. The first entry seen for an object
//! number wins, so later incremental updates shadow earlier ones.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::error::{PdfMergeError, Result};
use crate::object::{Dictionary, Object};
use crate::parser::filters::decode_stream;
use crate::parser::lexer::{Lexer, Token, rfind_subslice};
use crate::parser::objects::{ObjectParser, parse_indirect_object};

/// How far from the end of the file to look for `startxref`.
const STARTXREF_WINDOW: usize = 1024;

/// One cross-reference entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XrefEntry {
    /// Free object number.
    Free,
    /// Uncompressed object at a byte offset.
    InUse {
        /// Byte offset of the `n g obj` header.
        offset: usize,
        /// Generation number.
        generation: u16,
    },
    /// Object stored inside an object stream.
    Compressed {
        /// Object number of the containing object stream.
        stream: u32,
        /// Position within that stream.
        index: usize,
    },
}

/// Which flavour of cross-reference data the newest section used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum XrefKind {
    /// Classic `xref` table.
    Table,
    /// Cross-reference stream.
    Stream,
}

impl std::fmt::Display for XrefKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            XrefKind::Table => write!(f, "table"),
            XrefKind::Stream => write!(f, "stream"),
        }
    }
}

/// Merged view of every cross-reference section of a document.
#[derive(Debug, Clone)]
pub struct XrefTable {
    entries: HashMap<u32, XrefEntry>,
    trailer: Dictionary,
    kind: XrefKind,
    sections: usize,
}

impl XrefTable {
    /// Read all cross-reference data of `data`.
    pub fn load(data: &[u8]) -> Result<Self> {
        let start = find_startxref(data)?;

        let mut table = XrefTable {
            entries: HashMap::new(),
            trailer: Dictionary::new(),
            kind: XrefKind::Table,
            sections: 0,
        };
        let mut visited = HashSet::new();
        let mut next = Some(start);

        while let Some(pos) = next.take() {
            if !visited.insert(pos) {
                tracing::debug!(offset = pos, "cross-reference chain loops back; stopping");
                break;
            }

            let section = read_section(data, pos)?;
            if table.sections == 0 {
                table.kind = section.kind;
            }
            table.absorb_entries(&section.entries);

            // Hybrid files: the stream named by /XRefStm sits between this
            // table and the one named by /Prev.
            if let Some(stm_pos) = offset_entry(&section.trailer, b"XRefStm")
                && visited.insert(stm_pos)
            {
                match read_section(data, stm_pos) {
                    Ok(hidden) => table.absorb_entries(&hidden.entries),
                    Err(e) => tracing::debug!(offset = stm_pos, error = %e, "ignoring unreadable /XRefStm"),
                }
            }

            next = offset_entry(&section.trailer, b"Prev");
            table.absorb_trailer(section.trailer);
            table.sections += 1;
        }

        Ok(table)
    }

    fn absorb_entries(&mut self, entries: &[(u32, XrefEntry)]) {
        for &(num, entry) in entries {
            self.entries.entry(num).or_insert(entry);
        }
    }

    fn absorb_trailer(&mut self, trailer: Dictionary) {
        for (key, value) in trailer.iter() {
            if matches!(key.as_slice(), b"Prev" | b"XRefStm") || self.trailer.has(key) {
                continue;
            }
            self.trailer.set(key.clone(), value.clone());
        }
    }

    /// Entry for an object number.
    pub fn get(&self, num: u32) -> Option<XrefEntry> {
        self.entries.get(&num).copied()
    }

    /// The merged trailer dictionary (newest value for each key).
    pub fn trailer(&self) -> &Dictionary {
        &self.trailer
    }

    /// Kind of the newest section.
    pub fn kind(&self) -> XrefKind {
        self.kind
    }

    /// Number of sections in the chain.
    pub fn sections(&self) -> usize {
        self.sections
    }

    /// Number of object numbers with an entry (free ones included).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no entries were found.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of objects that are not free.
    pub fn in_use(&self) -> usize {
        self.entries
            .values()
            .filter(|e| !matches!(e, XrefEntry::Free))
            .count()
    }
}

fn offset_entry(trailer: &Dictionary, key: &[u8]) -> Option<usize> {
    trailer
        .get_integer(key)
        .and_then(|n| usize::try_from(n).ok())
}

/// Byte offset named by the last `startxref` in the file.
pub fn find_startxref(data: &[u8]) -> Result<usize> {
    let window_start = data.len().saturating_sub(STARTXREF_WINDOW);
    let Some(rel) = rfind_subslice(&data[window_start..], b"startxref") else {
        return Err(PdfMergeError::missing_root(
            "no startxref marker near the end of the file",
        ));
    };

    let mut lexer = Lexer::at(data, window_start + rel + b"startxref".len());
    match lexer.next_token() {
        Ok(Token::Integer(offset)) if offset >= 0 => Ok(offset as usize),
        _ => Err(PdfMergeError::missing_root(
            "startxref is not followed by a byte offset",
        )),
    }
}

struct Section {
    entries: Vec<(u32, XrefEntry)>,
    trailer: Dictionary,
    kind: XrefKind,
}

fn read_section(data: &[u8], pos: usize) -> Result<Section> {
    let mut lexer = Lexer::at(data, pos);
    if lexer.next_token().is_ok_and(|t| t.is_keyword(b"xref")) {
        read_table(&mut lexer)
    } else {
        read_stream_section(data, pos)
    }
}

fn read_table(lexer: &mut Lexer<'_>) -> Result<Section> {
    let mut subsections: Vec<(u32, Vec<XrefEntry>)> = Vec::new();

    loop {
        let at = lexer.tell();
        let start = match lexer.next_token()? {
            Token::Keyword(k) if k == b"trailer" => break,
            Token::Integer(start) => start,
            _ => {
                return Err(PdfMergeError::malformed_object(format!(
                    "bad cross-reference subsection header at byte {at}"
                )));
            }
        };
        let count = match lexer.next_token()? {
            Token::Integer(count) => count,
            _ => {
                return Err(PdfMergeError::malformed_object(format!(
                    "cross-reference subsection at byte {at} has no count"
                )));
            }
        };
        let (Ok(start), Ok(count)) = (u32::try_from(start), u32::try_from(count)) else {
            return Err(PdfMergeError::malformed_object(format!(
                "negative cross-reference subsection at byte {at}"
            )));
        };

        let mut subsection = Vec::with_capacity(count.min(4096) as usize);
        for _ in 0..count {
            let at = lexer.tell();
            let row = (lexer.next_token()?, lexer.next_token()?, lexer.next_token()?);
            let entry = match row {
                (Token::Integer(offset), Token::Integer(generation), Token::Keyword(kind)) => {
                    let generation = u16::try_from(generation).unwrap_or(u16::MAX);
                    match kind.as_slice() {
                        b"n" => XrefEntry::InUse {
                            offset: usize::try_from(offset).map_err(|_| {
                                PdfMergeError::malformed_object(format!(
                                    "negative offset in cross-reference row at byte {at}"
                                ))
                            })?,
                            generation,
                        },
                        b"f" => XrefEntry::Free,
                        _ => {
                            return Err(PdfMergeError::malformed_object(format!(
                                "cross-reference row at byte {at} is neither 'n' nor 'f'"
                            )));
                        }
                    }
                }
                _ => {
                    return Err(PdfMergeError::malformed_object(format!(
                        "truncated cross-reference row at byte {at}"
                    )));
                }
            };
            subsection.push(entry);
        }

        subsections.push((start, subsection));
    }

    let mut parser = ObjectParser::at(lexer.data(), lexer.tell());
    let trailer = match parser.parse_object()? {
        Object::Dictionary(dict) => dict,
        other => {
            return Err(PdfMergeError::malformed_object(format!(
                "trailer is a {}, not a dictionary",
                other.kind()
            )));
        }
    };

    // Some writers number the free-list head as object 1. Only the original
    // table holds the head; an update may legitimately free object 1.
    if !trailer.has(b"Prev")
        && let Some((start, rows)) = subsections.first_mut()
        && *start == 1
        && matches!(rows.first(), Some(XrefEntry::Free))
    {
        *start = 0;
    }

    let entries = subsections
        .into_iter()
        .flat_map(|(start, rows)| {
            rows.into_iter()
                .enumerate()
                .filter_map(move |(i, e)| start.checked_add(i as u32).map(|num| (num, e)))
        })
        .collect();

    Ok(Section {
        entries,
        trailer,
        kind: XrefKind::Table,
    })
}

fn read_stream_section(data: &[u8], pos: usize) -> Result<Section> {
    let (id, object) = parse_indirect_object(data, pos, None, &mut |_| None).map_err(|_| {
        PdfMergeError::malformed_object(format!(
            "startxref offset {pos} points at neither an xref table nor an xref stream"
        ))
    })?;
    let Object::Stream(stream) = object else {
        return Err(PdfMergeError::malformed_object_at(
            id,
            "cross-reference offset names a non-stream object",
        ));
    };
    if !stream.dict.has_type(b"XRef") {
        return Err(PdfMergeError::malformed_object_at(
            id,
            "cross-reference offset names a stream that is not /Type /XRef",
        ));
    }

    let widths = read_widths(&stream.dict)?;
    let size = stream.dict.get_integer(b"Size").unwrap_or(0).max(0) as u64;
    let index = read_index(&stream.dict, size)?;
    let payload = decode_stream(&stream).map_err(|e| match e {
        PdfMergeError::MalformedObject { reason, .. } => {
            PdfMergeError::malformed_object_at(id, reason)
        }
        other => other,
    })?;

    let row_len: usize = widths.iter().sum();
    if row_len == 0 {
        return Err(PdfMergeError::malformed_object_at(
            id,
            "cross-reference stream /W widths are all zero",
        ));
    }

    let mut rows = payload.chunks_exact(row_len);
    let mut entries = Vec::new();
    'subsections: for (start, count) in index {
        for i in 0..count {
            let Some(row) = rows.next() else {
                break 'subsections;
            };
            let Some(num) = u32::try_from(start + i).ok() else {
                break 'subsections;
            };

            let (f0, rest) = row.split_at(widths[0]);
            let (f1, f2) = rest.split_at(widths[1]);
            // A zero-width type field defaults to type 1.
            let kind = if widths[0] == 0 { 1 } else { be_field(f0) };
            let (f1, f2) = (be_field(f1), be_field(f2));

            let entry = match kind {
                0 => XrefEntry::Free,
                1 => XrefEntry::InUse {
                    offset: f1 as usize,
                    generation: u16::try_from(f2).unwrap_or(u16::MAX),
                },
                2 => XrefEntry::Compressed {
                    stream: u32::try_from(f1).map_err(|_| {
                        PdfMergeError::malformed_object_at(id, "object stream number out of range")
                    })?,
                    index: f2 as usize,
                },
                // Unknown types are reserved and read as null references.
                _ => XrefEntry::Free,
            };
            entries.push((num, entry));
        }
    }

    Ok(Section {
        entries,
        trailer: stream.dict,
        kind: XrefKind::Stream,
    })
}

fn read_widths(dict: &Dictionary) -> Result<[usize; 3]> {
    let widths = dict
        .get(b"W")
        .and_then(Object::as_array)
        .filter(|w| w.len() == 3)
        .ok_or_else(|| PdfMergeError::malformed_object("cross-reference stream needs a 3-element /W"))?;

    let mut out = [0usize; 3];
    for (slot, width) in out.iter_mut().zip(widths) {
        *slot = width
            .as_integer()
            .and_then(|w| usize::try_from(w).ok())
            .filter(|&w| w <= 8)
            .ok_or_else(|| PdfMergeError::malformed_object("invalid /W entry in cross-reference stream"))?;
    }
    Ok(out)
}

fn read_index(dict: &Dictionary, size: u64) -> Result<Vec<(u64, u64)>> {
    let Some(index) = dict.get(b"Index") else {
        return Ok(vec![(0, size)]);
    };
    let items = index
        .as_array()
        .ok_or_else(|| PdfMergeError::malformed_object("/Index must be an array"))?;

    items
        .chunks_exact(2)
        .map(|pair| match (pair[0].as_integer(), pair[1].as_integer()) {
            (Some(start), Some(count)) if start >= 0 && count >= 0 => {
                Ok((start as u64, count as u64))
            }
            _ => Err(PdfMergeError::malformed_object("invalid /Index pair")),
        })
        .collect()
}

fn be_field(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0u64, |acc, &b| acc << 8 | u64::from(b))
}
