//! Delimiter matching over JSON text
//!
//! The decoder never builds a token stream. It finds the next top-level
//! occurrence of a delimiter (a byte outside every string and bracket)
//! and slices the text around it. All delimiters are ASCII, so byte
//! offsets are always valid `str` boundaries.

use super::{unescape_str, DecodeError};

/// Tracks open quote and bracket contexts while scanning
#[derive(Debug, Default)]
struct Nesting {
    /// Closers of the currently open contexts, innermost last
    closers: Vec<u8>,
    escaped: bool,
}

impl Nesting {
    /// Consume one byte. Returns true when the byte sits at top level,
    /// i.e. unescaped and outside any open context (checked before the
    /// byte itself opens or closes one).
    fn feed(&mut self, byte: u8) -> bool {
        if self.escaped {
            self.escaped = false;
            return false;
        }
        if byte == b'\\' {
            self.escaped = true;
            return false;
        }

        let top_level = self.closers.is_empty();
        match self.closers.last().copied() {
            // Inside a string only the closing quote matters
            Some(b'"') => {
                if byte == b'"' {
                    self.closers.pop();
                }
            }
            Some(closer) if closer == byte => {
                self.closers.pop();
            }
            _ => {
                if let Some(closer) = closer_for(byte) {
                    self.closers.push(closer);
                }
            }
        }
        top_level
    }
}

fn closer_for(opener: u8) -> Option<u8> {
    match opener {
        b'"' => Some(b'"'),
        b'{' => Some(b'}'),
        b'[' => Some(b']'),
        _ => None,
    }
}

/// Find the first top-level occurrence of `target` at or after `start`
///
/// Scanning starts with no open context, so `start` must not point into
/// the middle of a string literal.
pub fn find_unnested(text: &str, target: u8, start: usize) -> Option<usize> {
    let mut nesting = Nesting::default();
    text.as_bytes()
        .iter()
        .enumerate()
        .skip(start)
        .find(|&(_, &byte)| nesting.feed(byte) && byte == target)
        .map(|(i, _)| i)
}

/// Index of the unescaped quote closing a string whose body starts at `start`
pub(crate) fn string_end(text: &str, start: usize) -> Option<usize> {
    let mut escaped = false;
    for (i, &byte) in text.as_bytes().iter().enumerate().skip(start) {
        if escaped {
            escaped = false;
        } else if byte == b'\\' {
            escaped = true;
        } else if byte == b'"' {
            return Some(i);
        }
    }
    None
}

/// Body of `text` between `open` at index 0 and its matching `close`,
/// which must be the last byte
fn enclosed<'a>(
    text: &'a str,
    open: u8,
    close: u8,
    what: &'static str,
) -> Result<&'a str, DecodeError> {
    if text.as_bytes().first() != Some(&open) {
        return Err(DecodeError::mismatch(what, text));
    }
    match find_unnested(text, close, 1) {
        Some(end) if end == text.len() - 1 => Ok(&text[1..end]),
        Some(_) => Err(DecodeError::malformed(what, text)),
        None => Err(DecodeError::Unterminated {
            expected: close as char,
        }),
    }
}

/// Split the body of a list or object on top-level commas
fn split_top_level<'a>(body: &'a str, what: &'static str) -> Result<Vec<&'a str>, DecodeError> {
    if body.trim().is_empty() {
        return Ok(Vec::new());
    }

    let mut items = Vec::new();
    let mut start = 0;
    loop {
        let end = find_unnested(body, b',', start);
        let item = body[start..end.unwrap_or(body.len())].trim();
        if item.is_empty() {
            return Err(DecodeError::malformed(what, body));
        }
        items.push(item);
        match end {
            Some(comma) => start = comma + 1,
            None => return Ok(items),
        }
    }
}

/// Split `[a,b,...]` into its top-level item texts
pub(crate) fn split_list(text: &str) -> Result<Vec<&str>, DecodeError> {
    let body = enclosed(text, b'[', b']', "list")?;
    split_top_level(body, "list")
}

/// Split `{"k":v,...}` into unescaped keys and raw value texts
pub(crate) fn split_object(text: &str) -> Result<Vec<(String, &str)>, DecodeError> {
    let body = enclosed(text, b'{', b'}', "object")?;
    split_top_level(body, "object")?
        .into_iter()
        .map(split_field)
        .collect()
}

fn split_field(field: &str) -> Result<(String, &str), DecodeError> {
    if !field.starts_with('"') {
        return Err(DecodeError::malformed("object key", field));
    }
    let key_end = string_end(field, 1).ok_or(DecodeError::Unterminated { expected: '"' })?;
    let key = unescape_str(&field[1..key_end])?;

    let rest = field[key_end + 1..].trim_start();
    let value = rest
        .strip_prefix(':')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| DecodeError::malformed("object field", field))?;
    Ok((key, value))
}
