//! Positional argument packing
//!
//! An argument list travels as one object keyed by position:
//! `{"an":N,"a1":<arg 1>,...,"aN":<arg N>}`. Nothing on the wire says
//! what each argument is, so unpacking takes one shape per slot.

use super::json::{decode, write_value};
use super::scan::{find_unnested, split_object};
use super::{DecodeError, EncodeError, Shape, Value};

/// Key holding the argument count
pub const ARGUMENT_COUNT_KEY: &str = "an";

/// Upper bound on a declared argument count
pub const MAX_ARGUMENTS: usize = 1024;

fn argument_key(position: usize) -> String {
    format!("a{}", position)
}

/// Pack an ordered argument list into one JSON object
pub fn pack(args: &[Value]) -> Result<String, EncodeError> {
    let mut out = format!("{{\"{}\":{}", ARGUMENT_COUNT_KEY, args.len());
    for (i, arg) in args.iter().enumerate() {
        out.push_str(",\"");
        out.push_str(&argument_key(i + 1));
        out.push_str("\":");
        write_value(&mut out, arg)?;
    }
    out.push('}');
    Ok(out)
}

/// Unpack an argument object, decoding slot `i` with `shapes[i]`
///
/// Slots beyond `shapes` decode untyped, unused shapes are ignored and a
/// missing slot reads as null. A missing count means a single argument.
pub fn unpack(text: &str, shapes: &[Shape]) -> Result<Vec<Value>, DecodeError> {
    let (count, fields) = read_arguments(text)?;
    decode_slots(count, &fields, shapes)
}

/// Like [`unpack`], but a declared count differing from `shapes.len()` is
/// treated as protocol skew and rejected
pub fn unpack_exact(text: &str, shapes: &[Shape]) -> Result<Vec<Value>, DecodeError> {
    let (count, fields) = read_arguments(text)?;
    if count != shapes.len() {
        return Err(DecodeError::ArgumentMismatch {
            declared: count,
            expected: shapes.len(),
        });
    }
    decode_slots(count, &fields, shapes)
}

fn read_arguments(text: &str) -> Result<(usize, Vec<(String, &str)>), DecodeError> {
    let start = find_unnested(text, b'{', 0)
        .ok_or_else(|| DecodeError::mismatch("argument object", text.trim()))?;
    let end = find_unnested(text, b'}', start + 1).ok_or(DecodeError::Unterminated { expected: '}' })?;
    let fields = split_object(&text[start..=end])?;

    let count = match lookup(&fields, ARGUMENT_COUNT_KEY) {
        Some(raw) => raw
            .parse::<usize>()
            .ok()
            .filter(|&n| n <= MAX_ARGUMENTS)
            .ok_or_else(|| DecodeError::ArgumentCount(raw.to_string()))?,
        None => 1,
    };
    Ok((count, fields))
}

fn decode_slots(
    count: usize,
    fields: &[(String, &str)],
    shapes: &[Shape],
) -> Result<Vec<Value>, DecodeError> {
    (1..=count)
        .map(|position| {
            let shape = shapes.get(position - 1).unwrap_or(&Shape::Any);
            match lookup(fields, &argument_key(position)) {
                Some(raw) => decode(raw, shape),
                None => Ok(Value::Null),
            }
        })
        .collect()
}

fn lookup<'a>(fields: &[(String, &'a str)], key: &str) -> Option<&'a str> {
    fields
        .iter()
        .rev()
        .find(|(k, _)| k == key)
        .map(|(_, raw)| *raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pack_layout() {
        let text = pack(&[Value::from("s"), Value::Bool(true), Value::Int(42)]).unwrap();
        assert_eq!(text, r#"{"an":3,"a1":"s","a2":true,"a3":42}"#);
    }

    #[test]
    fn test_pack_empty() {
        assert_eq!(pack(&[]).unwrap(), r#"{"an":0}"#);
        assert_eq!(unpack(r#"{"an":0}"#, &[]).unwrap(), Vec::<Value>::new());
    }

    #[test]
    fn test_missing_count_means_one_argument() {
        let values = unpack(r#"{"a1":5}"#, &[Shape::Int]).unwrap();
        assert_eq!(values, vec![Value::Int(5)]);
    }

    #[test]
    fn test_missing_slot_is_null() {
        let values = unpack(r#"{"an":2,"a2":"x"}"#, &[Shape::Int, Shape::Str]).unwrap();
        assert_eq!(values, vec![Value::Null, Value::from("x")]);
    }

    #[test]
    fn test_surrounding_text_is_ignored() {
        let values = unpack("  prefix {\"an\":1,\"a1\":[1,2]} trailing", &[]).unwrap();
        assert_eq!(values, vec![Value::List(vec![Value::Int(1), Value::Int(2)])]);
    }

    #[test]
    fn test_oversized_count_rejected() {
        let text = format!(r#"{{"an":{}}}"#, MAX_ARGUMENTS + 1);
        assert!(matches!(
            unpack(&text, &[]),
            Err(DecodeError::ArgumentCount(_))
        ));
    }

    #[test]
    fn test_no_object_rejected() {
        assert!(unpack("[1,2]", &[]).is_err());
        assert!(unpack(r#"{"an":1"#, &[]).is_err());
    }
}
