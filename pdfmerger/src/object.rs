//! In-memory PDF object model.
//!
//! Objects are plain tagged values. Indirect objects are identified by an
//! [`ObjectId`] and refer to each other through [`Object::Reference`]; there
//! are no pointer links between objects, so a whole document graph is just a
//! map from ids to values.

use indexmap::IndexMap;

/// Object number and generation number of an indirect object.
pub type ObjectId = (u32, u16);

/// How a string was spelled in the source, kept for round-trip fidelity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StringFormat {
    /// `( ... )` string.
    #[default]
    Literal,
    /// `< ... >` string.
    Hexadecimal,
}

/// A PDF string: raw bytes plus the spelling it was read with.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PdfString {
    /// Decoded bytes (escapes and hex digits already resolved).
    pub bytes: Vec<u8>,
    /// Original spelling.
    pub format: StringFormat,
}

impl PdfString {
    /// Create a literal string.
    pub fn literal(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
            format: StringFormat::Literal,
        }
    }

    /// Create a hexadecimal string.
    pub fn hex(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
            format: StringFormat::Hexadecimal,
        }
    }
}

/// A PDF dictionary. Key order is preserved as read.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Dictionary(IndexMap<Vec<u8>, Object>);

impl Dictionary {
    /// Create an empty dictionary.
    pub fn new() -> Self {
        Self(IndexMap::new())
    }

    /// Look up a key.
    pub fn get(&self, key: &[u8]) -> Option<&Object> {
        self.0.get(key)
    }

    /// Look up a key mutably.
    pub fn get_mut(&mut self, key: &[u8]) -> Option<&mut Object> {
        self.0.get_mut(key)
    }

    /// Check whether a key is present.
    pub fn has(&self, key: &[u8]) -> bool {
        self.0.contains_key(key)
    }

    /// Insert or replace a key, keeping the position of an existing key.
    pub fn set(&mut self, key: impl Into<Vec<u8>>, value: impl Into<Object>) {
        self.0.insert(key.into(), value.into());
    }

    /// Remove a key, preserving the order of the remaining entries.
    pub fn remove(&mut self, key: &[u8]) -> Option<Object> {
        self.0.shift_remove(key)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the dictionary is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over entries in order.
    pub fn iter(&self) -> impl Iterator<Item = (&Vec<u8>, &Object)> {
        self.0.iter()
    }

    /// Iterate mutably over entries in order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&Vec<u8>, &mut Object)> {
        self.0.iter_mut()
    }

    /// Value of a `/Name` entry, if the key holds a name.
    pub fn get_name(&self, key: &[u8]) -> Option<&[u8]> {
        self.get(key).and_then(Object::as_name)
    }

    /// Value of an integer entry.
    pub fn get_integer(&self, key: &[u8]) -> Option<i64> {
        self.get(key).and_then(Object::as_integer)
    }

    /// Whether `/Type` equals `type_name`.
    pub fn has_type(&self, type_name: &[u8]) -> bool {
        self.get_name(b"Type") == Some(type_name)
    }
}

impl FromIterator<(Vec<u8>, Object)> for Dictionary {
    fn from_iter<T: IntoIterator<Item = (Vec<u8>, Object)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// A stream object: its dictionary and the raw (still encoded) bytes.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Stream {
    /// Stream dictionary. `/Length` always matches `content.len()` once parsed.
    pub dict: Dictionary,
    /// Raw bytes between `stream` and `endstream`.
    pub content: Vec<u8>,
}

impl Stream {
    /// Create a stream, setting `/Length` from the content.
    pub fn new(mut dict: Dictionary, content: Vec<u8>) -> Self {
        dict.set("Length", content.len() as i64);
        Self { dict, content }
    }

    /// Whether the stream declares any `/Filter`.
    pub fn is_filtered(&self) -> bool {
        match self.dict.get(b"Filter") {
            None | Some(Object::Null) => false,
            Some(Object::Array(filters)) => !filters.is_empty(),
            Some(_) => true,
        }
    }
}

/// A PDF value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Object {
    /// `null`
    #[default]
    Null,
    /// `true` / `false`
    Boolean(bool),
    /// Integer number.
    Integer(i64),
    /// Real number.
    Real(f64),
    /// Literal or hexadecimal string.
    String(PdfString),
    /// Name, without the leading slash and with `#xx` escapes decoded.
    Name(Vec<u8>),
    /// Array.
    Array(Vec<Object>),
    /// Dictionary.
    Dictionary(Dictionary),
    /// Stream.
    Stream(Stream),
    /// Reference to an indirect object.
    Reference(ObjectId),
}

impl Object {
    /// Create a name object.
    pub fn name(name: impl Into<Vec<u8>>) -> Self {
        Self::Name(name.into())
    }

    /// Name bytes, if this is a name.
    pub fn as_name(&self) -> Option<&[u8]> {
        match self {
            Self::Name(name) => Some(name),
            _ => None,
        }
    }

    /// Integer value, if this is an integer.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(value) => Some(*value),
            _ => None,
        }
    }

    /// Numeric value of an integer or a real.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Integer(value) => Some(*value as f64),
            Self::Real(value) => Some(*value),
            _ => None,
        }
    }

    /// Target id, if this is a reference.
    pub fn as_reference(&self) -> Option<ObjectId> {
        match self {
            Self::Reference(id) => Some(*id),
            _ => None,
        }
    }

    /// Array items, if this is an array.
    pub fn as_array(&self) -> Option<&[Object]> {
        match self {
            Self::Array(items) => Some(items),
            _ => None,
        }
    }

    /// The dictionary of a dictionary or of a stream.
    pub fn as_dict(&self) -> Option<&Dictionary> {
        match self {
            Self::Dictionary(dict) => Some(dict),
            Self::Stream(stream) => Some(&stream.dict),
            _ => None,
        }
    }

    /// Mutable dictionary of a dictionary or of a stream.
    pub fn as_dict_mut(&mut self) -> Option<&mut Dictionary> {
        match self {
            Self::Dictionary(dict) => Some(dict),
            Self::Stream(stream) => Some(&mut stream.dict),
            _ => None,
        }
    }

    /// Stream, if this is a stream.
    pub fn as_stream(&self) -> Option<&Stream> {
        match self {
            Self::Stream(stream) => Some(stream),
            _ => None,
        }
    }

    /// Human-readable kind, for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Boolean(_) => "boolean",
            Self::Integer(_) => "integer",
            Self::Real(_) => "real",
            Self::String(_) => "string",
            Self::Name(_) => "name",
            Self::Array(_) => "array",
            Self::Dictionary(_) => "dictionary",
            Self::Stream(_) => "stream",
            Self::Reference(_) => "reference",
        }
    }

    /// Visit every reference contained in this value, depth first.
    pub fn for_each_reference(&self, visit: &mut impl FnMut(ObjectId)) {
        match self {
            Self::Reference(id) => visit(*id),
            Self::Array(items) => items.iter().for_each(|item| item.for_each_reference(visit)),
            Self::Dictionary(dict) => dict
                .iter()
                .for_each(|(_, value)| value.for_each_reference(visit)),
            Self::Stream(stream) => stream
                .dict
                .iter()
                .for_each(|(_, value)| value.for_each_reference(visit)),
            _ => {}
        }
    }

    /// Rewrite every reference contained in this value in place.
    pub fn map_references(&mut self, map: &mut impl FnMut(ObjectId) -> ObjectId) {
        match self {
            Self::Reference(id) => *id = map(*id),
            Self::Array(items) => items.iter_mut().for_each(|item| item.map_references(map)),
            Self::Dictionary(dict) => dict
                .iter_mut()
                .for_each(|(_, value)| value.map_references(map)),
            Self::Stream(stream) => stream
                .dict
                .iter_mut()
                .for_each(|(_, value)| value.map_references(map)),
            _ => {}
        }
    }
}

impl From<bool> for Object {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<i64> for Object {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for Object {
    fn from(value: f64) -> Self {
        Self::Real(value)
    }
}

impl From<ObjectId> for Object {
    fn from(id: ObjectId) -> Self {
        Self::Reference(id)
    }
}

impl From<PdfString> for Object {
    fn from(value: PdfString) -> Self {
        Self::String(value)
    }
}

impl From<Vec<Object>> for Object {
    fn from(items: Vec<Object>) -> Self {
        Self::Array(items)
    }
}

impl From<Dictionary> for Object {
    fn from(dict: Dictionary) -> Self {
        Self::Dictionary(dict)
    }
}

impl From<Stream> for Object {
    fn from(stream: Stream) -> Self {
        Self::Stream(stream)
    }
}
