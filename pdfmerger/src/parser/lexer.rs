//! PDF tokenizer.
//!
//! [`Lexer`] is a cursor over a borrowed byte buffer. It yields one
//! [`Token`] per call and can be rewound to any earlier position with
//! [`Lexer::seek`], which is how the object parser looks ahead for
//! `n g R` references. Stream bodies are never tokenized; the parser copies
//! them with [`Lexer::read_stream_body`].

use crate::error::{PdfMergeError, Result};
use crate::object::PdfString;

/// A primitive token.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Integer number, e.g. `42` or `-7`.
    Integer(i64),
    /// Real number, e.g. `3.14` or `-.5`.
    Real(f64),
    /// Literal or hexadecimal string.
    String(PdfString),
    /// Name without the leading slash, `#xx` escapes decoded.
    Name(Vec<u8>),
    /// `[`
    ArrayStart,
    /// `]`
    ArrayEnd,
    /// `<<`
    DictStart,
    /// `>>`
    DictEnd,
    /// Any other run of regular characters: `obj`, `R`, `true`, `trailer`...
    Keyword(Vec<u8>),
    /// End of the buffer.
    Eof,
}

impl Token {
    /// Whether the token is the given keyword.
    pub fn is_keyword(&self, keyword: &[u8]) -> bool {
        matches!(self, Token::Keyword(k) if k == keyword)
    }
}

/// PDF whitespace characters.
pub fn is_whitespace(byte: u8) -> bool {
    matches!(byte, b'\0' | b'\t' | b'\n' | b'\x0c' | b'\r' | b' ')
}

/// PDF delimiter characters.
pub fn is_delimiter(byte: u8) -> bool {
    matches!(
        byte,
        b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%'
    )
}

fn is_regular(byte: u8) -> bool {
    !is_whitespace(byte) && !is_delimiter(byte)
}

fn hex_value(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}

/// Restartable tokenizer over a byte buffer.
#[derive(Debug, Clone)]
pub struct Lexer<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Lexer<'a> {
    /// Create a lexer positioned at the start of `data`.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Create a lexer positioned at `pos`.
    pub fn at(data: &'a [u8], pos: usize) -> Self {
        Self {
            data,
            pos: pos.min(data.len()),
        }
    }

    /// Current byte offset.
    pub fn tell(&self) -> usize {
        self.pos
    }

    /// Move the cursor. Offsets past the end clamp to the end.
    pub fn seek(&mut self, pos: usize) {
        self.pos = pos.min(self.data.len());
    }

    /// The underlying buffer.
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    fn peek_byte(&self) -> Option<u8> {
        self.data.get(self.pos).copied()
    }

    /// Skip whitespace and comments.
    pub fn skip_whitespace(&mut self) {
        while let Some(byte) = self.peek_byte() {
            if is_whitespace(byte) {
                self.pos += 1;
            } else if byte == b'%' {
                while let Some(b) = self.peek_byte() {
                    if b == b'\n' || b == b'\r' {
                        break;
                    }
                    self.pos += 1;
                }
            } else {
                break;
            }
        }
    }

    /// Read the next token.
    pub fn next_token(&mut self) -> Result<Token> {
        self.skip_whitespace();
        let start = self.pos;
        let Some(byte) = self.peek_byte() else {
            return Ok(Token::Eof);
        };

        match byte {
            b'[' => {
                self.pos += 1;
                Ok(Token::ArrayStart)
            }
            b']' => {
                self.pos += 1;
                Ok(Token::ArrayEnd)
            }
            b'<' => {
                if self.data.get(self.pos + 1) == Some(&b'<') {
                    self.pos += 2;
                    Ok(Token::DictStart)
                } else {
                    self.read_hex_string()
                }
            }
            b'>' => {
                if self.data.get(self.pos + 1) == Some(&b'>') {
                    self.pos += 2;
                    Ok(Token::DictEnd)
                } else {
                    Err(PdfMergeError::malformed_token(start, "stray '>'"))
                }
            }
            b'(' => self.read_literal_string(),
            b')' => Err(PdfMergeError::malformed_token(start, "unbalanced ')'")),
            b'/' => Ok(self.read_name()),
            b'{' | b'}' => {
                self.pos += 1;
                Ok(Token::Keyword(vec![byte]))
            }
            b'+' | b'-' | b'.' | b'0'..=b'9' => self.read_number(),
            _ => Ok(self.read_keyword()),
        }
    }

    fn read_number(&mut self) -> Result<Token> {
        let start = self.pos;
        while self.peek_byte().is_some_and(is_regular) {
            self.pos += 1;
        }
        let text = &self.data[start..self.pos];

        let (sign, digits) = match text.first() {
            Some(b'+') | Some(b'-') => (&text[..1], &text[1..]),
            _ => (&text[..0], text),
        };
        let dots = digits.iter().filter(|&&b| b == b'.').count();
        let valid = !digits.is_empty()
            && dots <= 1
            && digits.iter().any(u8::is_ascii_digit)
            && digits.iter().all(|&b| b.is_ascii_digit() || b == b'.');
        if !valid {
            return Err(PdfMergeError::malformed_token(
                start,
                format!("invalid number '{}'", String::from_utf8_lossy(text)),
            ));
        }

        let literal = String::from_utf8_lossy(text);
        if dots == 0 {
            if let Ok(value) = literal.parse::<i64>() {
                return Ok(Token::Integer(value));
            }
        }

        let mut normalized = String::from_utf8_lossy(sign).into_owned();
        if digits.first() == Some(&b'.') {
            normalized.push('0');
        }
        normalized.push_str(&String::from_utf8_lossy(digits));
        if normalized.ends_with('.') {
            normalized.push('0');
        }
        normalized
            .parse::<f64>()
            .map(Token::Real)
            .map_err(|_| PdfMergeError::malformed_token(start, "number out of range"))
    }

    fn read_name(&mut self) -> Token {
        // Skip '/'
        self.pos += 1;
        let mut name = Vec::new();
        while let Some(byte) = self.peek_byte() {
            if !is_regular(byte) {
                break;
            }
            if byte == b'#' {
                let hi = self.data.get(self.pos + 1).copied().and_then(hex_value);
                let lo = self.data.get(self.pos + 2).copied().and_then(hex_value);
                if let (Some(hi), Some(lo)) = (hi, lo) {
                    name.push(hi << 4 | lo);
                    self.pos += 3;
                    continue;
                }
            }
            name.push(byte);
            self.pos += 1;
        }
        Token::Name(name)
    }

    fn read_keyword(&mut self) -> Token {
        let start = self.pos;
        while self.peek_byte().is_some_and(is_regular) {
            self.pos += 1;
        }
        Token::Keyword(self.data[start..self.pos].to_vec())
    }

    fn read_literal_string(&mut self) -> Result<Token> {
        let start = self.pos;
        // Skip '('
        self.pos += 1;
        let mut depth = 1usize;
        let mut bytes = Vec::new();

        loop {
            let Some(byte) = self.peek_byte() else {
                return Err(PdfMergeError::malformed_token(
                    start,
                    "unterminated literal string",
                ));
            };
            self.pos += 1;

            match byte {
                b'(' => {
                    depth += 1;
                    bytes.push(byte);
                }
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                    bytes.push(byte);
                }
                b'\\' => self.read_escape(&mut bytes),
                b'\r' => {
                    // Unescaped EOL of any flavour reads as a single LF.
                    if self.peek_byte() == Some(b'\n') {
                        self.pos += 1;
                    }
                    bytes.push(b'\n');
                }
                _ => bytes.push(byte),
            }
        }

        Ok(Token::String(PdfString::literal(bytes)))
    }

    fn read_escape(&mut self, bytes: &mut Vec<u8>) {
        let Some(byte) = self.peek_byte() else {
            return;
        };
        self.pos += 1;

        match byte {
            b'n' => bytes.push(b'\n'),
            b'r' => bytes.push(b'\r'),
            b't' => bytes.push(b'\t'),
            b'b' => bytes.push(0x08),
            b'f' => bytes.push(0x0c),
            b'0'..=b'7' => {
                let mut value = u32::from(byte - b'0');
                for _ in 0..2 {
                    match self.peek_byte() {
                        Some(d @ b'0'..=b'7') => {
                            value = value * 8 + u32::from(d - b'0');
                            self.pos += 1;
                        }
                        _ => break,
                    }
                }
                bytes.push((value & 0xff) as u8);
            }
            // Line continuation
            b'\r' => {
                if self.peek_byte() == Some(b'\n') {
                    self.pos += 1;
                }
            }
            b'\n' => {}
            // \( \) \\ and unknown escapes keep the escaped byte
            other => bytes.push(other),
        }
    }

    fn read_hex_string(&mut self) -> Result<Token> {
        let start = self.pos;
        // Skip '<'
        self.pos += 1;
        let mut bytes = Vec::new();
        let mut high: Option<u8> = None;

        loop {
            let Some(byte) = self.peek_byte() else {
                return Err(PdfMergeError::malformed_token(
                    start,
                    "unterminated hex string",
                ));
            };
            self.pos += 1;

            if byte == b'>' {
                break;
            }
            if is_whitespace(byte) {
                continue;
            }
            let Some(nibble) = hex_value(byte) else {
                return Err(PdfMergeError::malformed_token(
                    self.pos - 1,
                    format!("invalid byte 0x{byte:02x} in hex string"),
                ));
            };
            match high.take() {
                Some(hi) => bytes.push(hi << 4 | nibble),
                None => high = Some(nibble),
            }
        }

        // Odd digit count: the last digit is followed by an implicit 0.
        if let Some(hi) = high {
            bytes.push(hi << 4);
        }

        Ok(Token::String(PdfString::hex(bytes)))
    }

    /// Copy a stream body of `length` bytes.
    ///
    /// Must be called right after the `stream` keyword. Skips the single
    /// end-of-line marker that follows the keyword, then takes exactly
    /// `length` bytes. Returns `None` when the buffer is too short.
    pub fn read_stream_body(&mut self, length: usize) -> Option<&'a [u8]> {
        let body_start = self.stream_body_start();
        let end = body_start.checked_add(length)?;
        if end > self.data.len() {
            return None;
        }
        self.pos = end;
        Some(&self.data[body_start..end])
    }

    /// Offset of the first body byte after a `stream` keyword.
    pub fn stream_body_start(&self) -> usize {
        let mut pos = self.pos;
        // Some writers put spaces between the keyword and the EOL.
        while self.data.get(pos) == Some(&b' ') {
            pos += 1;
        }
        match self.data.get(pos) {
            Some(b'\r') if self.data.get(pos + 1) == Some(&b'\n') => pos + 2,
            Some(b'\r') | Some(b'\n') => pos + 1,
            _ => self.pos,
        }
    }

    /// Find the next occurrence of `needle` at or after the cursor.
    pub fn find(&self, needle: &[u8]) -> Option<usize> {
        find_subslice(&self.data[self.pos..], needle).map(|i| self.pos + i)
    }
}

impl Iterator for Lexer<'_> {
    type Item = Result<Token>;

    /// Yields tokens until end of input. After an error the sequence ends.
    fn next(&mut self) -> Option<Self::Item> {
        match self.next_token() {
            Ok(Token::Eof) => None,
            Ok(token) => Some(Ok(token)),
            Err(err) => {
                self.pos = self.data.len();
                Some(Err(err))
            }
        }
    }
}

/// Position of the first occurrence of `needle` in `haystack`.
pub fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Position of the last occurrence of `needle` in `haystack`.
pub fn rfind_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }
    haystack.windows(needle.len()).rposition(|w| w == needle)
}
