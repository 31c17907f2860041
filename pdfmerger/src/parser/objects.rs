//! Object parser.
//!
//! Builds [`Object`] values from lexer tokens: direct objects, indirect
//! objects at a byte offset (`n g obj ... endobj`), stream bodies, and the
//! members of compressed object streams.

use crate::error::{PdfMergeError, Result};
use crate::object::{Dictionary, Object, ObjectId, Stream};
use crate::parser::filters::decode_stream;
use crate::parser::lexer::{Lexer, Token, find_subslice};

/// Nesting limit for arrays and dictionaries.
const MAX_DEPTH: usize = 256;

/// Parser for PDF objects over one buffer.
pub struct ObjectParser<'a> {
    lexer: Lexer<'a>,
}

impl<'a> ObjectParser<'a> {
    /// Create a parser at the start of `data`.
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            lexer: Lexer::new(data),
        }
    }

    /// Create a parser at `offset`.
    pub fn at(data: &'a [u8], offset: usize) -> Self {
        Self {
            lexer: Lexer::at(data, offset),
        }
    }

    /// Access the underlying lexer.
    pub fn lexer(&mut self) -> &mut Lexer<'a> {
        &mut self.lexer
    }

    /// Parse one direct object. A `n g R` triple is read as a reference.
    pub fn parse_object(&mut self) -> Result<Object> {
        let start = self.lexer.tell();
        let token = self.lexer.next_token()?;
        self.object_from_token(token, start, 0)
    }

    fn object_from_token(&mut self, token: Token, start: usize, depth: usize) -> Result<Object> {
        if depth > MAX_DEPTH {
            return Err(PdfMergeError::malformed_object(format!(
                "nesting deeper than {MAX_DEPTH} levels at byte {start}"
            )));
        }

        match token {
            Token::Integer(num) => Ok(self.try_reference(num).unwrap_or(Object::Integer(num))),
            Token::Real(value) => Ok(Object::Real(value)),
            Token::String(s) => Ok(Object::String(s)),
            Token::Name(name) => Ok(Object::Name(name)),
            Token::ArrayStart => self.parse_array(depth),
            Token::DictStart => self.parse_dictionary(depth).map(Object::Dictionary),
            Token::Keyword(keyword) => match keyword.as_slice() {
                b"true" => Ok(Object::Boolean(true)),
                b"false" => Ok(Object::Boolean(false)),
                b"null" => Ok(Object::Null),
                other => Err(PdfMergeError::malformed_object(format!(
                    "unexpected keyword '{}' at byte {start}",
                    String::from_utf8_lossy(other)
                ))),
            },
            Token::ArrayEnd | Token::DictEnd => Err(PdfMergeError::malformed_object(format!(
                "unexpected closing delimiter at byte {start}"
            ))),
            Token::Eof => Err(PdfMergeError::malformed_object(
                "unexpected end of input while reading an object",
            )),
        }
    }

    /// After an integer, check for `g R`. Restores the cursor if absent.
    fn try_reference(&mut self, num: i64) -> Option<Object> {
        let mark = self.lexer.tell();
        let found = match (self.lexer.next_token(), self.lexer.next_token()) {
            (Ok(Token::Integer(generation)), Ok(Token::Keyword(k))) if k == b"R" => {
                match (u32::try_from(num), u16::try_from(generation)) {
                    (Ok(num), Ok(generation)) => Some(Object::Reference((num, generation))),
                    _ => None,
                }
            }
            _ => None,
        };
        if found.is_none() {
            self.lexer.seek(mark);
        }
        found
    }

    fn parse_array(&mut self, depth: usize) -> Result<Object> {
        let mut items = Vec::new();
        loop {
            let start = self.lexer.tell();
            match self.lexer.next_token()? {
                Token::ArrayEnd => return Ok(Object::Array(items)),
                Token::Eof => {
                    return Err(PdfMergeError::malformed_object("unterminated array"));
                }
                token => items.push(self.object_from_token(token, start, depth + 1)?),
            }
        }
    }

    fn parse_dictionary(&mut self, depth: usize) -> Result<Dictionary> {
        let mut dict = Dictionary::new();
        loop {
            let start = self.lexer.tell();
            match self.lexer.next_token()? {
                Token::DictEnd => return Ok(dict),
                Token::Name(key) => {
                    let value_start = self.lexer.tell();
                    let token = self.lexer.next_token()?;
                    if token == Token::DictEnd {
                        // Key without value
                        return Ok(dict);
                    }
                    let value = self.object_from_token(token, value_start, depth + 1)?;
                    // A null value is equivalent to the key being absent.
                    if value != Object::Null {
                        dict.set(key, value);
                    }
                }
                Token::Eof => {
                    return Err(PdfMergeError::malformed_object("unterminated dictionary"));
                }
                _ => {
                    return Err(PdfMergeError::malformed_object(format!(
                        "dictionary key is not a name at byte {start}"
                    )));
                }
            }
        }
    }
}

/// Parse the indirect object whose header starts at `offset`.
///
/// `expected` is the id the cross-reference data promised; a header with a
/// different object number is rejected. `resolve_length` resolves an
/// indirect stream `/Length`; the returned stream always carries a direct
/// `/Length` that matches its content.
pub fn parse_indirect_object(
    data: &[u8],
    offset: usize,
    expected: Option<ObjectId>,
    resolve_length: &mut dyn FnMut(ObjectId) -> Option<i64>,
) -> Result<(ObjectId, Object)> {
    let located = |reason: String| match expected {
        Some(id) => PdfMergeError::malformed_object_at(id, reason),
        None => PdfMergeError::malformed_object(reason),
    };

    if offset >= data.len() {
        return Err(located(format!(
            "offset {offset} is past the end of the file ({} bytes)",
            data.len()
        )));
    }

    let mut parser = ObjectParser::at(data, offset);
    let header = (
        parser.lexer.next_token(),
        parser.lexer.next_token(),
        parser.lexer.next_token(),
    );
    let id = match header {
        (Ok(Token::Integer(num)), Ok(Token::Integer(generation)), Ok(Token::Keyword(k)))
            if k == b"obj" =>
        {
            match (u32::try_from(num), u16::try_from(generation)) {
                (Ok(num), Ok(generation)) => (num, generation),
                _ => return Err(located(format!("invalid object header at byte {offset}"))),
            }
        }
        _ => {
            return Err(located(format!(
                "byte {offset} does not point at an object header"
            )));
        }
    };

    if let Some((expected_num, _)) = expected {
        if expected_num != id.0 {
            return Err(located(format!(
                "byte {offset} holds object {} {} instead",
                id.0, id.1
            )));
        }
    }

    let value = parser
        .parse_object()
        .map_err(|e| relocate(e, id))?;

    let mark = parser.lexer.tell();
    let next = parser.lexer.next_token().map_err(|e| relocate(e, id))?;
    if next.is_keyword(b"stream") {
        let Object::Dictionary(dict) = value else {
            return Err(PdfMergeError::malformed_object_at(
                id,
                "stream keyword after a non-dictionary",
            ));
        };
        let stream = read_stream(&mut parser.lexer, dict, id, resolve_length)?;
        return Ok((id, Object::Stream(stream)));
    }

    // `endobj` is optional in practice; anything else is left alone.
    if !next.is_keyword(b"endobj") {
        parser.lexer.seek(mark);
    }
    Ok((id, value))
}

fn relocate(err: PdfMergeError, id: ObjectId) -> PdfMergeError {
    match err {
        PdfMergeError::MalformedObject {
            document,
            object: None,
            reason,
        } => PdfMergeError::MalformedObject {
            document,
            object: Some(id),
            reason,
        },
        other => other,
    }
}

fn read_stream(
    lexer: &mut Lexer<'_>,
    mut dict: Dictionary,
    id: ObjectId,
    resolve_length: &mut dyn FnMut(ObjectId) -> Option<i64>,
) -> Result<Stream> {
    let declared = match dict.get(b"Length") {
        Some(Object::Integer(n)) => Some(*n),
        Some(Object::Reference(length_id)) => resolve_length(*length_id),
        _ => None,
    };

    let data = lexer.data();
    let body_start = lexer.stream_body_start();

    let content = match declared {
        Some(length) => {
            let length = usize::try_from(length).map_err(|_| {
                PdfMergeError::malformed_object_at(id, format!("negative stream length {length}"))
            })?;
            let body = lexer.read_stream_body(length).ok_or_else(|| {
                PdfMergeError::malformed_object_at(
                    id,
                    format!(
                        "stream length {length} exceeds the buffer ({} bytes left)",
                        data.len().saturating_sub(body_start)
                    ),
                )
            })?;
            let after = lexer.tell();
            if lexer.next_token().is_ok_and(|t| t.is_keyword(b"endstream")) {
                body.to_vec()
            } else {
                // Declared length is wrong; fall back to the endstream marker.
                tracing::debug!(object = id.0, length, "stream /Length does not reach endstream");
                lexer.seek(after);
                scan_to_endstream(lexer, body_start, id)?
            }
        }
        None => scan_to_endstream(lexer, body_start, id)?,
    };

    dict.set("Length", content.len() as i64);
    Ok(Stream { dict, content })
}

/// Take the body up to the next `endstream`, minus the EOL before it.
fn scan_to_endstream(lexer: &mut Lexer<'_>, body_start: usize, id: ObjectId) -> Result<Vec<u8>> {
    let data = lexer.data();
    let Some(rel) = find_subslice(&data[body_start..], b"endstream") else {
        return Err(PdfMergeError::malformed_token(
            body_start,
            format!("unterminated stream in object {} {}", id.0, id.1),
        ));
    };
    let mut end = body_start + rel;
    if end > body_start && data[end - 1] == b'\n' {
        end -= 1;
    }
    if end > body_start && data[end - 1] == b'\r' {
        end -= 1;
    }
    lexer.seek(body_start + rel + b"endstream".len());
    Ok(data[body_start..end].to_vec())
}

/// Parse every member of an object stream (`/Type /ObjStm`).
///
/// Returns `(object number, value)` pairs in stream order. Members always
/// have generation 0 and never are streams themselves.
pub fn parse_object_stream(stream: &Stream) -> Result<Vec<(u32, Object)>> {
    let count = stream
        .dict
        .get_integer(b"N")
        .and_then(|n| usize::try_from(n).ok())
        .ok_or_else(|| PdfMergeError::malformed_object("object stream without a valid /N"))?;
    let first = stream
        .dict
        .get_integer(b"First")
        .and_then(|n| usize::try_from(n).ok())
        .ok_or_else(|| PdfMergeError::malformed_object("object stream without a valid /First"))?;

    let data = decode_stream(stream)?;
    if first > data.len() {
        return Err(PdfMergeError::malformed_object(format!(
            "object stream /First {first} is past its {} decoded bytes",
            data.len()
        )));
    }

    let mut header = Lexer::new(&data[..first]);
    let mut entries = Vec::with_capacity(count.min(data.len()));
    for _ in 0..count {
        let pair = (header.next_token()?, header.next_token()?);
        match pair {
            (Token::Integer(num), Token::Integer(offset)) => {
                let num = u32::try_from(num).map_err(|_| {
                    PdfMergeError::malformed_object(format!("bad object number {num} in object stream"))
                })?;
                let offset = usize::try_from(offset).map_err(|_| {
                    PdfMergeError::malformed_object(format!("bad offset {offset} in object stream"))
                })?;
                entries.push((num, offset));
            }
            _ => {
                return Err(PdfMergeError::malformed_object(
                    "object stream header is truncated",
                ));
            }
        }
    }

    entries
        .into_iter()
        .map(|(num, offset)| {
            let mut parser = ObjectParser::at(&data, first.saturating_add(offset));
            let value = parser.parse_object().map_err(|e| relocate(e, (num, 0)))?;
            Ok((num, value))
        })
        .collect()
}
