//! In-memory values and the shape descriptors that drive decoding

use super::DecodeError;
use std::collections::{BTreeMap, HashMap};

/// A value that can be written to (or read from) the wire
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    /// Keyed mapping. Only string keys can be encoded.
    Map(Vec<(Value, Value)>),
    /// Structured record, written field by field in declaration order
    Record(Vec<(String, Value)>),
}

impl Value {
    /// Build a record from `(name, value)` pairs
    pub fn record<I, K>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        Value::Record(fields.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Build a string-keyed map from `(key, value)` pairs
    pub fn map<I, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        Value::Map(
            entries
                .into_iter()
                .map(|(k, v)| (Value::Str(k.into()), v))
                .collect(),
        )
    }

    /// Short name of the variant, used in error messages
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Int(_) => "integer",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Record(_) => "record",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(n) => Some(*n as f64),
            _ => None,
        }
    }

    /// Look up a field of a record, or a string key of a map
    pub fn get(&self, name: &str) -> Option<&Value> {
        match self {
            Value::Record(fields) => fields.iter().find(|(k, _)| k == name).map(|(_, v)| v),
            Value::Map(entries) => entries
                .iter()
                .find(|(k, _)| k.as_str() == Some(name))
                .map(|(_, v)| v),
            _ => None,
        }
    }

    /// Remove and return a named field of a record or map
    pub fn take(&mut self, name: &str) -> Option<Value> {
        match self {
            Value::Record(fields) => {
                let pos = fields.iter().position(|(k, _)| k == name)?;
                Some(fields.remove(pos).1)
            }
            Value::Map(entries) => {
                let pos = entries.iter().position(|(k, _)| k.as_str() == Some(name))?;
                Some(entries.remove(pos).1)
            }
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

/// Expected structure of a JSON text
///
/// Decoding is shape-directed: `{...}` may be a map or a record, and the
/// decoder has to be told which one the caller wants.
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    /// Infer from the text: objects become maps, numbers with a `.` floats
    Any,
    Bool,
    Int,
    Float,
    Str,
    List(Box<Shape>),
    Map(Box<Shape>),
    Record(Vec<(String, Shape)>),
}

impl Shape {
    pub fn list(item: Shape) -> Self {
        Shape::List(Box::new(item))
    }

    pub fn map(item: Shape) -> Self {
        Shape::Map(Box::new(item))
    }

    pub fn record<I, K>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, Shape)>,
        K: Into<String>,
    {
        Shape::Record(fields.into_iter().map(|(k, s)| (k.into(), s)).collect())
    }

    /// Shape that decodes `encode(value)` back into `value`
    pub fn of(value: &Value) -> Shape {
        match value {
            Value::Null => Shape::Any,
            Value::Bool(_) => Shape::Bool,
            Value::Int(_) => Shape::Int,
            Value::Float(_) => Shape::Float,
            Value::Str(_) => Shape::Str,
            Value::List(items) => Shape::list(common_shape(items.iter())),
            Value::Map(entries) => Shape::map(common_shape(entries.iter().map(|(_, v)| v))),
            Value::Record(fields) => Shape::Record(
                fields
                    .iter()
                    .map(|(k, v)| (k.clone(), Shape::of(v)))
                    .collect(),
            ),
        }
    }
}

fn common_shape<'a>(mut values: impl Iterator<Item = &'a Value>) -> Shape {
    let Some(first) = values.next() else {
        return Shape::Any;
    };
    let shape = Shape::of(first);
    if values.all(|v| Shape::of(v) == shape) {
        shape
    } else {
        Shape::Any
    }
}

/// Explicit per-type descriptor for the untagged wire format
///
/// Implementors state the shape they expect on the wire and convert to
/// and from [`Value`].
pub trait WireFormat: Sized {
    fn shape() -> Shape;

    fn to_value(&self) -> Value;

    fn from_value(value: Value) -> Result<Self, DecodeError>;
}

fn type_mismatch(expected: &'static str, found: &Value) -> DecodeError {
    DecodeError::TypeMismatch {
        expected,
        found: found.kind(),
    }
}

impl WireFormat for Value {
    fn shape() -> Shape {
        Shape::Any
    }

    fn to_value(&self) -> Value {
        self.clone()
    }

    fn from_value(value: Value) -> Result<Self, DecodeError> {
        Ok(value)
    }
}

impl WireFormat for bool {
    fn shape() -> Shape {
        Shape::Bool
    }

    fn to_value(&self) -> Value {
        Value::Bool(*self)
    }

    fn from_value(value: Value) -> Result<Self, DecodeError> {
        value.as_bool().ok_or_else(|| type_mismatch("boolean", &value))
    }
}

impl WireFormat for i64 {
    fn shape() -> Shape {
        Shape::Int
    }

    fn to_value(&self) -> Value {
        Value::Int(*self)
    }

    fn from_value(value: Value) -> Result<Self, DecodeError> {
        value.as_i64().ok_or_else(|| type_mismatch("integer", &value))
    }
}

macro_rules! narrow_int_wire_format {
    ($($ty:ty),*) => {
        $(
            impl WireFormat for $ty {
                fn shape() -> Shape {
                    Shape::Int
                }

                fn to_value(&self) -> Value {
                    Value::Int(*self as i64)
                }

                fn from_value(value: Value) -> Result<Self, DecodeError> {
                    let n = i64::from_value(value)?;
                    <$ty>::try_from(n).map_err(|_| DecodeError::OutOfRange {
                        value: n,
                        target: stringify!($ty),
                    })
                }
            }
        )*
    };
}

narrow_int_wire_format!(i32, u32, usize);

impl WireFormat for f64 {
    fn shape() -> Shape {
        Shape::Float
    }

    fn to_value(&self) -> Value {
        Value::Float(*self)
    }

    fn from_value(value: Value) -> Result<Self, DecodeError> {
        value.as_f64().ok_or_else(|| type_mismatch("float", &value))
    }
}

impl WireFormat for String {
    fn shape() -> Shape {
        Shape::Str
    }

    fn to_value(&self) -> Value {
        Value::Str(self.clone())
    }

    fn from_value(value: Value) -> Result<Self, DecodeError> {
        match value {
            Value::Str(s) => Ok(s),
            other => Err(type_mismatch("string", &other)),
        }
    }
}

impl<T: WireFormat> WireFormat for Option<T> {
    fn shape() -> Shape {
        T::shape()
    }

    fn to_value(&self) -> Value {
        match self {
            Some(v) => v.to_value(),
            None => Value::Null,
        }
    }

    fn from_value(value: Value) -> Result<Self, DecodeError> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl<T: WireFormat> WireFormat for Vec<T> {
    fn shape() -> Shape {
        Shape::list(T::shape())
    }

    fn to_value(&self) -> Value {
        Value::List(self.iter().map(WireFormat::to_value).collect())
    }

    fn from_value(value: Value) -> Result<Self, DecodeError> {
        match value {
            // A missing list is read as an empty one
            Value::Null => Ok(Vec::new()),
            Value::List(items) => items.into_iter().map(T::from_value).collect(),
            other => Err(type_mismatch("list", &other)),
        }
    }
}

fn map_entries<T: WireFormat>(value: Value) -> Result<Vec<(String, T)>, DecodeError> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::Map(entries) => entries
            .into_iter()
            .map(|(k, v)| match k {
                Value::Str(key) => T::from_value(v).map(|v| (key, v)),
                other => Err(type_mismatch("string key", &other)),
            })
            .collect(),
        Value::Record(fields) => fields
            .into_iter()
            .map(|(k, v)| T::from_value(v).map(|v| (k, v)))
            .collect(),
        other => Err(type_mismatch("map", &other)),
    }
}

impl<T: WireFormat> WireFormat for BTreeMap<String, T> {
    fn shape() -> Shape {
        Shape::map(T::shape())
    }

    fn to_value(&self) -> Value {
        Value::map(self.iter().map(|(k, v)| (k.clone(), v.to_value())))
    }

    fn from_value(value: Value) -> Result<Self, DecodeError> {
        Ok(map_entries(value)?.into_iter().collect())
    }
}

impl<T: WireFormat> WireFormat for HashMap<String, T> {
    fn shape() -> Shape {
        Shape::map(T::shape())
    }

    fn to_value(&self) -> Value {
        Value::map(self.iter().map(|(k, v)| (k.clone(), v.to_value())))
    }

    fn from_value(value: Value) -> Result<Self, DecodeError> {
        Ok(map_entries(value)?.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_of_nested_values() {
        let value = Value::List(vec![Value::Int(1), Value::Int(2)]);
        assert_eq!(Shape::of(&value), Shape::list(Shape::Int));

        let mixed = Value::List(vec![Value::Int(1), Value::Str("x".into())]);
        assert_eq!(Shape::of(&mixed), Shape::list(Shape::Any));

        let record = Value::record([("a", Value::Bool(true))]);
        assert_eq!(Shape::of(&record), Shape::record([("a", Shape::Bool)]));
    }

    #[test]
    fn test_record_lookup_and_take() {
        let mut record = Value::record([("a", Value::Int(1)), ("b", Value::from("x"))]);
        assert_eq!(record.get("b"), Some(&Value::from("x")));
        assert_eq!(record.take("a"), Some(Value::Int(1)));
        assert!(record.get("a").is_none());
    }

    #[test]
    fn test_narrow_int_out_of_range() {
        assert_eq!(u32::from_value(Value::Int(7)), Ok(7));
        assert_eq!(
            u32::from_value(Value::Int(-1)),
            Err(DecodeError::OutOfRange {
                value: -1,
                target: "u32"
            })
        );
    }

    #[test]
    fn test_option_and_vec_from_null() {
        assert_eq!(Option::<String>::from_value(Value::Null), Ok(None));
        assert_eq!(Vec::<i64>::from_value(Value::Null), Ok(Vec::new()));
    }

    #[test]
    fn test_type_mismatch() {
        let err = bool::from_value(Value::Str("true".into())).unwrap_err();
        assert_eq!(
            err,
            DecodeError::TypeMismatch {
                expected: "boolean",
                found: "string"
            }
        );
    }
}
