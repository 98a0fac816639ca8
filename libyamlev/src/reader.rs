//! Phase 1: Reader
//!
//! The reader turns a byte source into a stream of characters. It performs:
//! - Encoding detection from a leading byte-order mark (UTF-8 by default)
//! - Decoding and validation of UTF-8, UTF-16 and UTF-32
//! - Line break normalization (`\r\n` and `\r` become `\n`)
//! - Position tracking (byte offset, line, column)
//!
//! Characters are decoded on demand into a small lookahead buffer so that the
//! scanner can peek a few characters ahead before committing.

use crate::error::{Error, ParseContext, Result};
use std::collections::VecDeque;
use std::fmt;
use std::io::{self, Read};

const CHUNK_SIZE: usize = 8192;

/// A position in the source stream.
///
/// `index` is the byte offset into the raw input, `line` and `column` are
/// zero-based and count normalized characters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Mark {
    pub index: usize,
    pub line: usize,
    pub column: usize,
}

impl fmt::Display for Mark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {} column {}", self.line + 1, self.column + 1)
    }
}

/// Character encoding of the input stream.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Encoding {
    #[default]
    Utf8,
    Utf16Le,
    Utf16Be,
    Utf32Le,
    Utf32Be,
}

impl Encoding {
    /// Detect the encoding from the first bytes of the stream.
    /// Returns the encoding and the length of the byte-order mark.
    fn detect(head: &[u8]) -> (Encoding, usize) {
        match head {
            [0xEF, 0xBB, 0xBF, ..] => (Encoding::Utf8, 3),
            [0xFF, 0xFE, 0x00, 0x00, ..] => (Encoding::Utf32Le, 4),
            [0x00, 0x00, 0xFE, 0xFF, ..] => (Encoding::Utf32Be, 4),
            [0xFF, 0xFE, ..] => (Encoding::Utf16Le, 2),
            [0xFE, 0xFF, ..] => (Encoding::Utf16Be, 2),
            _ => (Encoding::Utf8, 0),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Encoding::Utf8 => "UTF-8",
            Encoding::Utf16Le => "UTF-16LE",
            Encoding::Utf16Be => "UTF-16BE",
            Encoding::Utf32Le => "UTF-32LE",
            Encoding::Utf32Be => "UTF-32BE",
        }
    }
}

/// Check whether a code point may appear in a YAML stream.
pub(crate) fn is_printable(ch: char) -> bool {
    matches!(ch,
        '\t' | '\n' | '\r' | '\u{85}'
        | '\u{20}'..='\u{7E}'
        | '\u{A0}'..='\u{D7FF}'
        | '\u{E000}'..='\u{FEFE}'
        | '\u{FF00}'..='\u{FFFD}'
        | '\u{10000}'..='\u{10FFFF}')
}

/// Outcome of decoding one character from the raw byte buffer.
enum Decoded {
    Char(char, usize),
    NeedMore,
    Invalid(String),
}

/// Forward-only character reader over a byte source.
pub(crate) struct Reader<R> {
    source: R,
    ctx: ParseContext,
    raw: Vec<u8>,
    raw_pos: usize,
    source_done: bool,
    encoding: Option<Encoding>,
    /// Decoded characters with the number of source bytes each consumed.
    buffer: VecDeque<(char, usize)>,
    after_cr: bool,
    mark: Mark,
    failure: Option<Error>,
}

impl<R: Read> Reader<R> {
    pub fn new(source: R, ctx: ParseContext) -> Self {
        Self {
            source,
            ctx,
            raw: Vec::new(),
            raw_pos: 0,
            source_done: false,
            encoding: None,
            buffer: VecDeque::new(),
            after_cr: false,
            mark: Mark::default(),
            failure: None,
        }
    }

    pub fn ctx(&self) -> &ParseContext {
        &self.ctx
    }

    /// Position of the next character.
    pub fn mark(&self) -> Mark {
        self.mark
    }

    /// The detected encoding, reading the byte-order mark if necessary.
    pub fn encoding(&mut self) -> Result<Encoding> {
        if let Some(encoding) = self.encoding {
            return Ok(encoding);
        }
        self.detect_encoding()
    }

    /// Ensure at least `n` characters are buffered. Fewer are buffered only
    /// at the end of input.
    pub fn fill(&mut self, n: usize) -> Result<()> {
        if let Some(err) = &self.failure {
            return Err(err.clone());
        }
        while self.buffer.len() < n {
            match self.decode_next() {
                Ok(true) => {}
                Ok(false) => break,
                Err(err) => {
                    self.failure = Some(err.clone());
                    return Err(err);
                }
            }
        }
        Ok(())
    }

    /// Peek at the buffered character at offset `i`; `'\0'` past the end of
    /// input or past the buffered lookahead.
    pub fn peek(&self, i: usize) -> char {
        self.buffer.get(i).map_or('\0', |&(ch, _)| ch)
    }

    /// Whether the buffered lookahead ends the input at offset `i`.
    pub fn is_end(&self, i: usize) -> bool {
        i >= self.buffer.len()
    }

    /// Advance past one buffered character.
    pub fn skip(&mut self) {
        if let Some((ch, width)) = self.buffer.pop_front() {
            self.mark.index += width;
            if ch == '\n' {
                self.mark.line += 1;
                self.mark.column = 0;
            } else {
                self.mark.column += 1;
            }
        }
    }

    /// Take the next character with its position, or `None` at end of input.
    #[cfg(test)]
    pub fn next_char(&mut self) -> Result<Option<(char, Mark)>> {
        self.fill(1)?;
        if self.buffer.is_empty() {
            return Ok(None);
        }
        let mark = self.mark;
        let ch = self.peek(0);
        self.skip();
        Ok(Some((ch, mark)))
    }

    /// Mark of the first character not yet buffered.
    fn decode_mark(&self) -> Mark {
        let mut mark = self.mark;
        for &(ch, width) in &self.buffer {
            mark.index += width;
            if ch == '\n' {
                mark.line += 1;
                mark.column = 0;
            } else {
                mark.column += 1;
            }
        }
        mark
    }

    /// Pull more bytes from the source. Returns `false` at end of source.
    fn read_more(&mut self) -> Result<bool> {
        if self.source_done {
            return Ok(false);
        }
        if self.raw_pos > 0 {
            self.raw.drain(..self.raw_pos);
            self.raw_pos = 0;
        }
        let mut chunk = [0u8; CHUNK_SIZE];
        loop {
            match self.source.read(&mut chunk) {
                Ok(0) => {
                    self.source_done = true;
                    return Ok(false);
                }
                Ok(n) => {
                    self.raw.extend_from_slice(&chunk[..n]);
                    return Ok(true);
                }
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => {
                    return Err(Error::io(&self.ctx, self.decode_mark(), err.to_string()));
                }
            }
        }
    }

    fn detect_encoding(&mut self) -> Result<Encoding> {
        while self.raw.len() - self.raw_pos < 4 && self.read_more()? {}
        let (encoding, bom_len) = Encoding::detect(&self.raw[self.raw_pos..]);
        self.raw_pos += bom_len;
        self.mark.index += bom_len;
        self.encoding = Some(encoding);
        tracing::debug!("Detected {} input", encoding.name());
        Ok(encoding)
    }

    /// Decode one character into the buffer. Returns `false` at end of input.
    fn decode_next(&mut self) -> Result<bool> {
        let encoding = self.encoding()?;
        loop {
            let decoded = decode_char(
                encoding,
                &self.raw[self.raw_pos..],
                self.source_done,
            );
            match decoded {
                Decoded::Char(ch, width) => {
                    self.raw_pos += width;
                    if self.accept(ch, width)? {
                        return Ok(true);
                    }
                }
                Decoded::NeedMore => {
                    if self.raw_pos == self.raw.len() && self.source_done {
                        return Ok(false);
                    }
                    if !self.read_more()? && self.raw_pos == self.raw.len() {
                        return Ok(false);
                    }
                }
                Decoded::Invalid(message) => {
                    return Err(Error::encoding(&self.ctx, self.decode_mark(), message));
                }
            }
        }
    }

    /// Normalize and validate a decoded character. Returns `false` when the
    /// character was folded into the previous one (the `\n` of `\r\n`).
    fn accept(&mut self, ch: char, width: usize) -> Result<bool> {
        if ch == '\n' && self.after_cr {
            self.after_cr = false;
            if let Some(last) = self.buffer.back_mut() {
                last.1 += width;
            } else {
                // The `\r` was already consumed; attribute the byte to it.
                self.mark.index += width;
            }
            return Ok(false);
        }
        self.after_cr = ch == '\r';
        if !is_printable(ch) {
            return Err(Error::encoding(
                &self.ctx,
                self.decode_mark(),
                format!("Forbidden code point U+{:04X}", ch as u32),
            ));
        }
        let normalized = if ch == '\r' { '\n' } else { ch };
        self.buffer.push_back((normalized, width));
        Ok(true)
    }
}

fn decode_char(encoding: Encoding, bytes: &[u8], at_end: bool) -> Decoded {
    match encoding {
        Encoding::Utf8 => decode_utf8(bytes, at_end),
        Encoding::Utf16Le => decode_utf16(bytes, at_end, u16::from_le_bytes),
        Encoding::Utf16Be => decode_utf16(bytes, at_end, u16::from_be_bytes),
        Encoding::Utf32Le => decode_utf32(bytes, at_end, u32::from_le_bytes),
        Encoding::Utf32Be => decode_utf32(bytes, at_end, u32::from_be_bytes),
    }
}

fn decode_utf8(bytes: &[u8], at_end: bool) -> Decoded {
    let Some(&lead) = bytes.first() else {
        return Decoded::NeedMore;
    };
    let width = match lead {
        0x00..=0x7F => return Decoded::Char(lead as char, 1),
        0xC2..=0xDF => 2,
        0xE0..=0xEF => 3,
        0xF0..=0xF4 => 4,
        _ => return Decoded::Invalid(format!("Invalid UTF-8 leading byte 0x{:02X}", lead)),
    };
    if bytes.len() < width {
        if at_end {
            return Decoded::Invalid("Incomplete UTF-8 sequence".to_string());
        }
        return Decoded::NeedMore;
    }
    match std::str::from_utf8(&bytes[..width]) {
        Ok(s) => match s.chars().next() {
            Some(ch) => Decoded::Char(ch, width),
            None => Decoded::Invalid("Invalid UTF-8 sequence".to_string()),
        },
        Err(_) => Decoded::Invalid("Invalid UTF-8 sequence".to_string()),
    }
}

fn decode_utf16(bytes: &[u8], at_end: bool, unit: fn([u8; 2]) -> u16) -> Decoded {
    if bytes.len() < 2 {
        if at_end && !bytes.is_empty() {
            return Decoded::Invalid("Incomplete UTF-16 code unit".to_string());
        }
        return Decoded::NeedMore;
    }
    let first = unit([bytes[0], bytes[1]]);
    if !(0xD800..=0xDBFF).contains(&first) {
        return match char::from_u32(first as u32) {
            Some(ch) => Decoded::Char(ch, 2),
            None => Decoded::Invalid("Unexpected low surrogate in UTF-16 input".to_string()),
        };
    }
    if bytes.len() < 4 {
        if at_end {
            return Decoded::Invalid("Incomplete UTF-16 surrogate pair".to_string());
        }
        return Decoded::NeedMore;
    }
    let second = unit([bytes[2], bytes[3]]);
    match char::decode_utf16([first, second]).next() {
        Some(Ok(ch)) => Decoded::Char(ch, 4),
        _ => Decoded::Invalid("Expected low surrogate in UTF-16 input".to_string()),
    }
}

fn decode_utf32(bytes: &[u8], at_end: bool, unit: fn([u8; 4]) -> u32) -> Decoded {
    if bytes.len() < 4 {
        if at_end && !bytes.is_empty() {
            return Decoded::Invalid("Incomplete UTF-32 code unit".to_string());
        }
        return Decoded::NeedMore;
    }
    let value = unit([bytes[0], bytes[1], bytes[2], bytes[3]]);
    match char::from_u32(value) {
        Some(ch) => Decoded::Char(ch, 4),
        None => Decoded::Invalid(format!("Invalid UTF-32 code point 0x{:X}", value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_all(bytes: &[u8]) -> Result<(Vec<(char, Mark)>, Encoding)> {
        let mut reader = Reader::new(bytes, ParseContext::new(None));
        let encoding = reader.encoding()?;
        let mut chars = Vec::new();
        while let Some(item) = reader.next_char()? {
            chars.push(item);
        }
        Ok((chars, encoding))
    }

    fn text(bytes: &[u8]) -> String {
        read_all(bytes).unwrap().0.into_iter().map(|(c, _)| c).collect()
    }

    /// A source that hands out one byte per read call.
    struct Trickle<'a>(&'a [u8]);

    impl Read for Trickle<'_> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.0.split_first() {
                Some((&b, rest)) if !buf.is_empty() => {
                    buf[0] = b;
                    self.0 = rest;
                    Ok(1)
                }
                _ => Ok(0),
            }
        }
    }

    #[test]
    fn test_plain_utf8() {
        assert_eq!(text(b"a: b"), "a: b");
        let (_, encoding) = read_all(b"x").unwrap();
        assert_eq!(encoding, Encoding::Utf8);
    }

    #[test]
    fn test_utf8_bom_is_skipped() {
        let (chars, encoding) = read_all(b"\xEF\xBB\xBFab").unwrap();
        assert_eq!(encoding, Encoding::Utf8);
        assert_eq!(chars[0].0, 'a');
        assert_eq!(chars[0].1.index, 3);
        assert_eq!(chars[0].1.column, 0);
    }

    #[test]
    fn test_utf16le_with_bom() {
        let bytes = [0xFF, 0xFE, b'h', 0, b'i', 0, 0x3D, 0xD8, 0x00, 0xDE];
        let (chars, encoding) = read_all(&bytes).unwrap();
        assert_eq!(encoding, Encoding::Utf16Le);
        let s: String = chars.iter().map(|(c, _)| *c).collect();
        assert_eq!(s, "hi\u{1F600}");
        assert_eq!(chars[2].1.index, 6);
    }

    #[test]
    fn test_utf16be_with_bom() {
        let bytes = [0xFE, 0xFF, 0, b'o', 0, b'k'];
        assert_eq!(text(&bytes), "ok");
    }

    #[test]
    fn test_utf32_with_bom() {
        let le = [0xFF, 0xFE, 0, 0, b'z', 0, 0, 0];
        let be = [0, 0, 0xFE, 0xFF, 0, 0, 0, b'z'];
        assert_eq!(read_all(&le).unwrap().1, Encoding::Utf32Le);
        assert_eq!(text(&le), "z");
        assert_eq!(read_all(&be).unwrap().1, Encoding::Utf32Be);
        assert_eq!(text(&be), "z");
    }

    #[test]
    fn test_line_breaks_are_normalized() {
        let (chars, _) = read_all(b"a\r\nb\rc\n").unwrap();
        let s: String = chars.iter().map(|(c, _)| *c).collect();
        assert_eq!(s, "a\nb\nc\n");
        // 'b' follows a two-byte break
        assert_eq!(chars[2].1, Mark { index: 3, line: 1, column: 0 });
        assert_eq!(chars[4].1, Mark { index: 5, line: 2, column: 0 });
    }

    #[test]
    fn test_crlf_split_across_reads() {
        let mut reader = Reader::new(Trickle(b"a\r\nb"), ParseContext::new(None));
        let mut out = Vec::new();
        while let Some(item) = reader.next_char().unwrap() {
            out.push(item);
        }
        let s: String = out.iter().map(|(c, _)| *c).collect();
        assert_eq!(s, "a\nb");
        assert_eq!(out[2].1.index, 3);
    }

    #[test]
    fn test_multibyte_split_across_reads() {
        let mut reader = Reader::new(Trickle("é€".as_bytes()), ParseContext::new(None));
        assert_eq!(reader.next_char().unwrap().map(|(c, _)| c), Some('é'));
        assert_eq!(reader.next_char().unwrap().map(|(c, _)| c), Some('€'));
        assert_eq!(reader.next_char().unwrap(), None);
    }

    #[test]
    fn test_invalid_utf8_is_encoding_error() {
        let err = read_all(b"ok\xFFno").unwrap_err();
        assert_eq!(err.kind_name(), "encoding");
        assert_eq!(err.mark().column, 2);
    }

    #[test]
    fn test_truncated_utf8_is_encoding_error() {
        let err = read_all(b"ab\xE2\x82").unwrap_err();
        assert_eq!(err.kind_name(), "encoding");
    }

    #[test]
    fn test_lone_surrogate_in_utf16() {
        let bytes = [0xFF, 0xFE, 0x00, 0xDC];
        let err = read_all(&bytes).unwrap_err();
        assert_eq!(err.kind_name(), "encoding");
    }

    #[test]
    fn test_control_character_rejected() {
        let err = read_all(b"a\x07b").unwrap_err();
        assert!(err.to_string().starts_with("Forbidden code point U+0007"));
    }

    #[test]
    fn test_byte_order_mark_only_at_start() {
        assert_eq!(text(b"\xEF\xBB\xBFa"), "a");
        let err = read_all("a\u{FEFF}b".as_bytes()).unwrap_err();
        assert_eq!(err.kind_name(), "encoding");
        assert!(err.to_string().starts_with("Forbidden code point U+FEFF"));
        assert_eq!(err.mark().index, 1);
        // A second mark right after the first is content too.
        let err = read_all(b"\xEF\xBB\xBF\xEF\xBB\xBFa").unwrap_err();
        assert_eq!(err.kind_name(), "encoding");
    }

    #[test]
    fn test_errors_are_sticky() {
        let mut reader = Reader::new(&b"\xFF"[..], ParseContext::new(None));
        assert!(reader.fill(1).is_err());
        assert!(reader.fill(1).is_err());
    }

    #[test]
    fn test_peek_past_end() {
        let mut reader = Reader::new(&b"ab"[..], ParseContext::new(None));
        reader.fill(4).unwrap();
        assert_eq!(reader.peek(0), 'a');
        assert_eq!(reader.peek(1), 'b');
        assert_eq!(reader.peek(2), '\0');
        assert!(reader.is_end(2));
    }
}
