//! Source documents.
//!
//! [`SourceDocument`] borrows the raw bytes of one input and loads indirect
//! objects on demand through its cross-reference data. Resolving it yields a
//! [`ResolvedDocument`]: the ordered page sequence plus every object
//! reachable from those pages, which is all the merge engine needs.

pub mod pages;
pub mod xref;

use std::collections::{HashMap, VecDeque};
use std::fmt;

use indexmap::IndexMap;
use serde::{Serialize, Serializer};

use crate::error::{PdfMergeError, Result};
use crate::merge::CancelToken;
use crate::object::{Dictionary, Object, ObjectId};
use crate::parser::lexer::find_subslice;
use crate::parser::objects::{parse_indirect_object, parse_object_stream};

pub use pages::{INHERITABLE, PageLeaf, collect_pages};
pub use xref::{XrefEntry, XrefKind, XrefTable};

/// Where the `%PDF-` header may start.
const HEADER_WINDOW: usize = 1024;

/// PDF version from the file header or the catalog's `/Version`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version {
    /// Major version, `1` for every PDF 1.x file.
    pub major: u8,
    /// Minor version.
    pub minor: u8,
}

impl Version {
    /// PDF 1.4.
    pub const V1_4: Version = Version::new(1, 4);
    /// PDF 1.5, the first with object and cross-reference streams.
    pub const V1_5: Version = Version::new(1, 5);

    /// Create a version.
    pub const fn new(major: u8, minor: u8) -> Self {
        Self { major, minor }
    }

    /// Parse `M.m` at the start of `text`.
    pub fn parse(text: &[u8]) -> Option<Self> {
        match text {
            [major @ b'0'..=b'9', b'.', minor @ b'0'..=b'9', ..] => {
                Some(Self::new(major - b'0', minor - b'0'))
            }
            _ => None,
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// One parsed input document.
pub struct SourceDocument<'a> {
    data: &'a [u8],
    version: Version,
    xref: XrefTable,
    object_streams: HashMap<u32, Vec<(u32, Object)>>,
}

impl<'a> SourceDocument<'a> {
    /// Check the header and load the cross-reference data.
    ///
    /// Encrypted documents are rejected here.
    pub fn open(data: &'a [u8]) -> Result<Self> {
        let window = &data[..data.len().min(HEADER_WINDOW)];
        let Some(header) = find_subslice(window, b"%PDF-") else {
            return Err(PdfMergeError::malformed_object("missing %PDF- header"));
        };
        let version = Version::parse(&data[header + 5..]).ok_or_else(|| {
            PdfMergeError::malformed_object("%PDF- header does not carry a version")
        })?;

        let xref = XrefTable::load(data)?;
        if xref.trailer().has(b"Encrypt") {
            return Err(PdfMergeError::EncryptedDocument { document: None });
        }

        Ok(Self {
            data,
            version,
            xref,
            object_streams: HashMap::new(),
        })
    }

    /// Header version.
    pub fn version(&self) -> Version {
        self.version
    }

    /// Cross-reference data.
    pub fn xref(&self) -> &XrefTable {
        &self.xref
    }

    /// Trailer dictionary.
    pub fn trailer(&self) -> &Dictionary {
        self.xref.trailer()
    }

    /// Id under which object `id.0` is stored. Lookup is by number, so
    /// references with another generation name the same object.
    pub fn canonical_id(&self, id: ObjectId) -> ObjectId {
        match self.xref.get(id.0) {
            Some(XrefEntry::InUse { generation, .. }) => (id.0, generation),
            Some(XrefEntry::Compressed { .. }) => (id.0, 0),
            _ => id,
        }
    }

    /// Load an indirect object.
    ///
    /// A number with no cross-reference entry is a dangling reference and
    /// fails; a free entry reads as `null`.
    pub fn object(&mut self, id: ObjectId) -> Result<Object> {
        match self.xref.get(id.0) {
            None => Err(PdfMergeError::malformed_object_at(
                id,
                "reference to an object missing from the cross-reference table",
            )),
            Some(XrefEntry::Free) => Ok(Object::Null),
            Some(XrefEntry::InUse { offset, .. }) => self.object_at(id, offset),
            Some(XrefEntry::Compressed { stream, index }) => self.compressed_object(id, stream, index),
        }
    }

    fn object_at(&self, id: ObjectId, offset: usize) -> Result<Object> {
        let (data, xref) = (self.data, &self.xref);
        let mut lengths = |length_id: ObjectId| direct_length(data, xref, length_id);
        parse_indirect_object(data, offset, Some(id), &mut lengths).map(|(_, object)| object)
    }

    fn compressed_object(&mut self, id: ObjectId, stream_num: u32, index: usize) -> Result<Object> {
        if !self.object_streams.contains_key(&stream_num) {
            let stream_id = (stream_num, 0);
            let offset = match self.xref.get(stream_num) {
                Some(XrefEntry::InUse { offset, .. }) => offset,
                _ => {
                    return Err(PdfMergeError::malformed_object_at(
                        id,
                        format!("object stream {stream_num} is not stored uncompressed"),
                    ));
                }
            };
            let members = match self.object_at(stream_id, offset)? {
                Object::Stream(stream) => parse_object_stream(&stream).map_err(|e| match e {
                    PdfMergeError::MalformedObject { object: None, reason, .. } => {
                        PdfMergeError::malformed_object_at(stream_id, reason)
                    }
                    other => other,
                })?,
                other => {
                    return Err(PdfMergeError::malformed_object_at(
                        stream_id,
                        format!("expected an object stream, found a {}", other.kind()),
                    ));
                }
            };
            self.object_streams.insert(stream_num, members);
        }

        let members = self
            .object_streams
            .get(&stream_num)
            .map(Vec::as_slice)
            .unwrap_or_default();
        members
            .get(index)
            .filter(|(num, _)| *num == id.0)
            .or_else(|| members.iter().find(|(num, _)| *num == id.0))
            .map(|(_, object)| object.clone())
            .ok_or_else(|| {
                PdfMergeError::malformed_object_at(
                    id,
                    format!("not found in object stream {stream_num}"),
                )
            })
    }

    /// The document catalog.
    pub fn catalog(&mut self) -> Result<Dictionary> {
        let root = self
            .trailer()
            .get(b"Root")
            .and_then(Object::as_reference)
            .ok_or_else(|| PdfMergeError::missing_root("trailer has no /Root reference"))?;
        match self.object(root) {
            Ok(Object::Dictionary(catalog)) => Ok(catalog),
            Ok(other) => Err(PdfMergeError::missing_root(format!(
                "/Root {} {} is a {}, not a dictionary",
                root.0,
                root.1,
                other.kind()
            ))),
            Err(e) => Err(PdfMergeError::missing_root(format!(
                "catalog {} {} cannot be read: {e}",
                root.0, root.1
            ))),
        }
    }

    /// Id of the page tree root named by the catalog.
    pub fn page_tree_root(&mut self) -> Result<ObjectId> {
        self.catalog()?
            .get(b"Pages")
            .and_then(Object::as_reference)
            .ok_or_else(|| PdfMergeError::missing_root("catalog has no /Pages reference"))
    }

    /// Walk the page tree and collect the objects reachable from its pages.
    pub fn resolve(mut self, cancel: &CancelToken) -> Result<ResolvedDocument> {
        let catalog = self.catalog()?;
        let version = catalog
            .get_name(b"Version")
            .and_then(Version::parse)
            .map_or(self.version, |v| v.max(self.version));
        let root = catalog
            .get(b"Pages")
            .and_then(Object::as_reference)
            .ok_or_else(|| PdfMergeError::missing_root("catalog has no /Pages reference"))?;
        let root = self.canonical_id(root);

        let leaves = collect_pages(&mut self, root, cancel)?;
        let pages: Vec<ObjectId> = leaves.iter().map(|leaf| leaf.id).collect();

        let mut objects = IndexMap::new();
        let mut pending = VecDeque::new();
        for leaf in leaves {
            if objects.contains_key(&leaf.id) {
                continue;
            }
            let mut page = Object::Dictionary(leaf.dict);
            page.map_references(&mut |id| self.canonical_id(id));
            page.for_each_reference(&mut |id| pending.push_back(id));
            objects.insert(leaf.id, page);
        }

        while let Some(id) = pending.pop_front() {
            if objects.contains_key(&id) {
                continue;
            }
            cancel.check()?;
            let mut object = self.object(id)?;
            object.map_references(&mut |child| self.canonical_id(child));
            object.for_each_reference(&mut |child| {
                if !objects.contains_key(&child) {
                    pending.push_back(child);
                }
            });
            objects.insert(id, object);
        }

        tracing::debug!(
            version = %version,
            pages = pages.len(),
            reachable = objects.len(),
            source_objects = self.xref.in_use(),
            "resolved document"
        );

        Ok(ResolvedDocument {
            version,
            pages,
            objects,
            xref_kind: self.xref.kind(),
            source_objects: self.xref.in_use(),
            size: self.data.len(),
        })
    }
}

/// Resolve a `/Length` stored in its own object, without recursing into
/// further indirect lengths.
fn direct_length(data: &[u8], xref: &XrefTable, id: ObjectId) -> Option<i64> {
    match xref.get(id.0)? {
        XrefEntry::InUse { offset, .. } => {
            match parse_indirect_object(data, offset, Some(id), &mut |_| None) {
                Ok((_, Object::Integer(length))) => Some(length),
                _ => None,
            }
        }
        _ => None,
    }
}

/// Everything the merge engine needs from one input document.
#[derive(Debug, Clone)]
pub struct ResolvedDocument {
    /// Highest of header and catalog version.
    pub version: Version,
    /// Page ids in document order.
    pub pages: Vec<ObjectId>,
    /// Objects reachable from the pages, in discovery order, pages first.
    /// Page dictionaries are already detached from their old parents.
    pub objects: IndexMap<ObjectId, Object>,
    /// Kind of the newest cross-reference section.
    pub xref_kind: XrefKind,
    /// Objects in use according to the cross-reference data.
    pub source_objects: usize,
    /// Size of the input in bytes.
    pub size: usize,
}

impl ResolvedDocument {
    /// Parse and resolve a document in one step.
    pub fn from_bytes(data: &[u8], cancel: &CancelToken) -> Result<Self> {
        SourceDocument::open(data)?.resolve(cancel)
    }

    /// Number of pages.
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Number of reachable objects.
    pub fn object_count(&self) -> usize {
        self.objects.len()
    }
}
