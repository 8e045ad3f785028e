//! Line-oriented `key=value` text encoding shared by every persistent file.
//!
//! One entry per line, split at the first `=`. Values escape `\`, newline and
//! carriage return so an entry never spans lines. Lists are comma-joined with
//! item commas escaped. Readers keep a one-entry lookahead so optional keys
//! (for example a result digest) can be probed without consuming.

pub mod error;


pub use error::{FormatError, FormatResult};

use std::io::{self, BufRead, Write};

use crate::hashing::Digest;

/// Escapes a value so it fits on one line.
pub fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            _ => out.push(c),
        }
    }
    out
}

/// Reverses [`escape`]. Returns `None` on a dangling or unknown escape.
pub fn unescape(value: &str) -> Option<String> {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next()? {
            '\\' => out.push('\\'),
            'n' => out.push('\n'),
            'r' => out.push('\r'),
            _ => return None,
        }
    }
    Some(out)
}

/// Joins list items with `,`, escaping `\` and `,` inside items.
pub fn join_list<I, S>(items: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out = String::new();
    for (i, item) in items.into_iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        for c in item.as_ref().chars() {
            match c {
                '\\' => out.push_str("\\\\"),
                ',' => out.push_str("\\,"),
                _ => out.push(c),
            }
        }
    }
    out
}

/// Reverses [`join_list`]. An empty string is an empty list.
pub fn split_list(value: &str) -> Option<Vec<String>> {
    if value.is_empty() {
        return Some(Vec::new());
    }

    let mut items = Vec::new();
    let mut current = String::new();
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next()? {
                '\\' => current.push('\\'),
                ',' => current.push(','),
                _ => return None,
            },
            ',' => items.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    items.push(current);
    Some(items)
}

/// Encodes a user-supplied name into a safe file name.
///
/// ASCII alphanumerics, `-` and `_` pass through; every other byte becomes `%XX`.
/// The result never contains a path separator and never starts with `.`.
pub fn encode_file_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for byte in name.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{:02X}", byte));
        }
    }
    out
}

/// Reverses [`encode_file_name`]. Returns `None` for names it could not have produced.
pub fn decode_file_name(encoded: &str) -> Option<String> {
    let bytes = encoded.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'%' => {
                let pair = encoded.get(i + 1..i + 3)?;
                out.push(u8::from_str_radix(pair, 16).ok()?);
                i += 3;
            }
            b if b.is_ascii_alphanumeric() || b == b'-' || b == b'_' => {
                out.push(b);
                i += 1;
            }
            _ => return None,
        }
    }
    String::from_utf8(out).ok()
}

/// Writes `key=value` lines.
#[derive(Debug)]
pub struct KvWriter<W: Write> {
    inner: W,
}

impl<W: Write> KvWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    pub fn write(&mut self, key: &str, value: &str) -> io::Result<()> {
        debug_assert!(!key.contains('=') && !key.contains('\n'));
        writeln!(self.inner, "{}={}", key, escape(value))
    }

    pub fn write_u64(&mut self, key: &str, value: u64) -> io::Result<()> {
        writeln!(self.inner, "{}={}", key, value)
    }

    pub fn write_i64(&mut self, key: &str, value: i64) -> io::Result<()> {
        writeln!(self.inner, "{}={}", key, value)
    }

    pub fn write_bool(&mut self, key: &str, value: bool) -> io::Result<()> {
        writeln!(self.inner, "{}={}", key, value)
    }

    pub fn write_digest(&mut self, key: &str, digest: &Digest) -> io::Result<()> {
        writeln!(self.inner, "{}={}", key, digest.to_hex())
    }

    pub fn write_list<I, S>(&mut self, key: &str, items: I) -> io::Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.write(key, &join_list(items))
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }

    pub fn get_mut(&mut self) -> &mut W {
        &mut self.inner
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

#[derive(Debug)]
struct Entry {
    key: String,
    value: String,
    line: usize,
    start: u64,
}

/// Reads `key=value` lines with one entry of lookahead.
#[derive(Debug)]
pub struct KvReader<R: BufRead> {
    inner: R,
    buf: String,
    lines_read: usize,
    offset: u64,
    peeked: Option<Entry>,
}

impl<R: BufRead> KvReader<R> {
    pub fn new(inner: R) -> Self {
        Self::with_offset(inner, 0)
    }

    /// Starts a reader whose first byte sits at `offset` in the underlying file,
    /// so [`KvReader::position`] reports absolute file offsets.
    pub fn with_offset(inner: R, offset: u64) -> Self {
        Self {
            inner,
            buf: String::new(),
            lines_read: 0,
            offset,
            peeked: None,
        }
    }

    /// Byte offset of the next entry that has not been consumed.
    pub fn position(&self) -> u64 {
        self.peeked.as_ref().map_or(self.offset, |e| e.start)
    }

    fn fill(&mut self) -> FormatResult<()> {
        if self.peeked.is_some() {
            return Ok(());
        }

        self.buf.clear();
        let start = self.offset;
        let read = self.inner.read_line(&mut self.buf)?;
        if read == 0 {
            return Ok(());
        }
        self.offset += read as u64;
        self.lines_read += 1;
        let line = self.lines_read;

        let raw = self
            .buf
            .strip_suffix('\n')
            .map(|s| s.strip_suffix('\r').unwrap_or(s))
            .unwrap_or(&self.buf);
        let (key, value) = raw
            .split_once('=')
            .ok_or(FormatError::MalformedLine { line })?;
        let value = unescape(value).ok_or(FormatError::MalformedLine { line })?;

        self.peeked = Some(Entry {
            key: key.to_string(),
            value,
            line,
            start,
        });
        Ok(())
    }

    pub fn is_eof(&mut self) -> FormatResult<bool> {
        self.fill()?;
        Ok(self.peeked.is_none())
    }

    pub fn peek_key(&mut self) -> FormatResult<Option<&str>> {
        self.fill()?;
        Ok(self.peeked.as_ref().map(|e| e.key.as_str()))
    }

    /// Consumes the next entry, whatever its key.
    pub fn next_entry(&mut self) -> FormatResult<Option<(String, String)>> {
        self.fill()?;
        Ok(self.peeked.take().map(|e| (e.key, e.value)))
    }

    fn take_expected(&mut self, key: &'static str) -> FormatResult<Entry> {
        self.fill()?;
        match self.peeked.take() {
            None => Err(FormatError::UnexpectedEof { expected: key }),
            Some(entry) if entry.key == key => Ok(entry),
            Some(entry) => Err(FormatError::UnexpectedKey {
                line: entry.line,
                expected: key,
                found: entry.key,
            }),
        }
    }

    pub fn expect(&mut self, key: &'static str) -> FormatResult<String> {
        self.take_expected(key).map(|e| e.value)
    }

    /// Consumes the next entry only if it carries `key`.
    pub fn optional(&mut self, key: &'static str) -> FormatResult<Option<String>> {
        if self.peek_key()? == Some(key) {
            return self.expect(key).map(Some);
        }
        Ok(None)
    }

    /// Consumes `key` and converts its value with `parse`, reporting the line on failure.
    pub fn expect_parsed<T>(
        &mut self,
        key: &'static str,
        parse: impl FnOnce(&str) -> Option<T>,
    ) -> FormatResult<T> {
        let entry = self.take_expected(key)?;
        parse(&entry.value).ok_or(FormatError::InvalidValue {
            line: entry.line,
            key,
            value: entry.value,
        })
    }

    pub fn expect_u64(&mut self, key: &'static str) -> FormatResult<u64> {
        self.expect_parsed(key, |v| v.parse().ok())
    }

    pub fn expect_i64(&mut self, key: &'static str) -> FormatResult<i64> {
        self.expect_parsed(key, |v| v.parse().ok())
    }

    pub fn expect_bool(&mut self, key: &'static str) -> FormatResult<bool> {
        self.expect_parsed(key, |v| match v {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        })
    }

    pub fn expect_list(&mut self, key: &'static str) -> FormatResult<Vec<String>> {
        self.expect_parsed(key, split_list)
    }

    pub fn expect_digest(&mut self, key: &'static str) -> FormatResult<Digest> {
        let value = self.expect(key)?;
        Digest::from_hex(&value)
    }

    pub fn optional_digest(&mut self, key: &'static str) -> FormatResult<Option<Digest>> {
        self.optional(key)?
            .map(|value| Digest::from_hex(&value))
            .transpose()
    }
}
