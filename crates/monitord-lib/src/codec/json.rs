//! Value to JSON text and back

use super::scan::{split_list, split_object, string_end};
use super::{DecodeError, EncodeError, Shape, Value};

/// Escape a string for use inside JSON quotes
///
/// Only backslash, quote, newline and carriage return are escaped, which
/// is enough to keep every encoded value on a single line.
pub fn escape_str(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            _ => out.push(c),
        }
    }
    out
}

/// Reverse [`escape_str`], also accepting the other short JSON escapes
pub fn unescape_str(s: &str) -> Result<String, DecodeError> {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('"') => out.push('"'),
            Some('/') => out.push('/'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some('b') => out.push('\u{8}'),
            Some('f') => out.push('\u{c}'),
            Some(other) => return Err(DecodeError::UnsupportedEscape(other)),
            None => return Err(DecodeError::malformed("escape sequence", s)),
        }
    }
    Ok(out)
}

/// Encode a value as single-line JSON text
pub fn encode(value: &Value) -> Result<String, EncodeError> {
    let mut out = String::new();
    write_value(&mut out, value)?;
    Ok(out)
}

pub(crate) fn write_value(out: &mut String, value: &Value) -> Result<(), EncodeError> {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Int(n) => out.push_str(&n.to_string()),
        Value::Float(f) => write_float(out, *f)?,
        Value::Str(s) => write_str(out, s),
        Value::List(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(out, item)?;
            }
            out.push(']');
        }
        Value::Map(entries) => {
            out.push('{');
            for (i, (key, item)) in entries.iter().enumerate() {
                let Value::Str(key) = key else {
                    return Err(EncodeError::NonStringKey(key.kind()));
                };
                if i > 0 {
                    out.push(',');
                }
                write_str(out, key);
                out.push(':');
                write_value(out, item)?;
            }
            out.push('}');
        }
        Value::Record(fields) => {
            out.push('{');
            for (i, (name, item)) in fields.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_str(out, name);
                out.push(':');
                write_value(out, item)?;
            }
            out.push('}');
        }
    }
    Ok(())
}

fn write_str(out: &mut String, s: &str) {
    out.push('"');
    out.push_str(&escape_str(s));
    out.push('"');
}

fn write_float(out: &mut String, f: f64) -> Result<(), EncodeError> {
    if !f.is_finite() {
        return Err(EncodeError::NonFinite(f));
    }
    // Display never uses an exponent; keep a fraction so `Any` reads it back as a float
    let text = f.to_string();
    out.push_str(&text);
    if !text.contains('.') {
        out.push_str(".0");
    }
    Ok(())
}

/// Upper bound on list/object nesting accepted by [`decode`]
pub const MAX_DEPTH: usize = 128;

/// Decode JSON text into a value of the expected shape
pub fn decode(text: &str, shape: &Shape) -> Result<Value, DecodeError> {
    decode_nested(text, shape, 0)
}

fn decode_nested(text: &str, shape: &Shape, depth: usize) -> Result<Value, DecodeError> {
    let text = text.trim();
    if text == "null" {
        return Ok(Value::Null);
    }

    match shape {
        Shape::Any => decode_untyped(text, depth),
        Shape::Bool => match text {
            "true" => Ok(Value::Bool(true)),
            "false" => Ok(Value::Bool(false)),
            _ => Err(DecodeError::mismatch("boolean", text)),
        },
        Shape::Int => decode_int(text),
        Shape::Float => decode_float(text),
        Shape::Str => decode_string(text).map(Value::Str),
        Shape::List(item) => {
            let depth = descend(depth)?;
            split_list(text)?
                .into_iter()
                .map(|raw| decode_nested(raw, item, depth))
                .collect::<Result<_, _>>()
                .map(Value::List)
        }
        Shape::Map(item) => {
            let depth = descend(depth)?;
            split_object(text)?
                .into_iter()
                .map(|(key, raw)| decode_nested(raw, item, depth).map(|v| (Value::Str(key), v)))
                .collect::<Result<_, _>>()
                .map(Value::Map)
        }
        Shape::Record(fields) => {
            let depth = descend(depth)?;
            let raw_fields = split_object(text)?;
            fields
                .iter()
                .map(|(name, field_shape)| {
                    // Last occurrence wins; absent fields read as null
                    let value = match raw_fields.iter().rev().find(|(k, _)| k == name) {
                        Some((_, raw)) => decode_nested(raw, field_shape, depth),
                        None => Ok(Value::Null),
                    };
                    value.map(|v| (name.clone(), v))
                })
                .collect::<Result<_, _>>()
                .map(Value::Record)
        }
    }
}

fn descend(depth: usize) -> Result<usize, DecodeError> {
    if depth >= MAX_DEPTH {
        return Err(DecodeError::TooDeep { limit: MAX_DEPTH });
    }
    Ok(depth + 1)
}

fn decode_untyped(text: &str, depth: usize) -> Result<Value, DecodeError> {
    match text.as_bytes().first() {
        Some(b'"') => decode_string(text).map(Value::Str),
        Some(b'[') => decode_nested(text, &Shape::list(Shape::Any), depth),
        Some(b'{') => decode_nested(text, &Shape::map(Shape::Any), depth),
        _ => match text {
            "true" => Ok(Value::Bool(true)),
            "false" => Ok(Value::Bool(false)),
            _ if !is_plain_number(text) => Err(DecodeError::malformed("value", text)),
            _ if text.contains('.') => decode_float(text),
            _ => decode_int(text).or_else(|_| decode_float(text)),
        },
    }
}

fn decode_string(text: &str) -> Result<String, DecodeError> {
    if !text.starts_with('"') {
        return Err(DecodeError::mismatch("string", text));
    }
    match string_end(text, 1) {
        Some(end) if end == text.len() - 1 => unescape_str(&text[1..end]),
        Some(_) => Err(DecodeError::malformed("string", text)),
        None => Err(DecodeError::Unterminated { expected: '"' }),
    }
}

fn decode_int(text: &str) -> Result<Value, DecodeError> {
    text.parse::<i64>()
        .map(Value::Int)
        .map_err(|_| DecodeError::mismatch("integer", text))
}

fn decode_float(text: &str) -> Result<Value, DecodeError> {
    if !is_plain_number(text) {
        return Err(DecodeError::mismatch("number", text));
    }
    text.parse::<f64>()
        .map(Value::Float)
        .map_err(|_| DecodeError::mismatch("number", text))
}

/// `-?digits(.digits)?` with no exponent
fn is_plain_number(text: &str) -> bool {
    let digits = text.strip_prefix('-').unwrap_or(text);
    let (whole, fraction) = match digits.split_once('.') {
        Some((whole, fraction)) => (whole, Some(fraction)),
        None => (digits, None),
    };
    let all_digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    all_digits(whole) && fraction.map_or(true, all_digits)
}
