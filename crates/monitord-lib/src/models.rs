//! Core data models for the telemetry client
//!
//! Wire field names (`time`, `logString`, ...) are the ones the collector
//! service expects.

use crate::codec::{DecodeError, Shape, Value, WireFormat};

/// Level names understood by the collector
pub mod level {
    pub const LOG: &str = "Log";
    pub const WARNING: &str = "Warning";
    pub const ERROR: &str = "Error";
}

/// A captured log line
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    /// Seconds since the collector started
    pub timestamp: f64,
    pub message: String,
    pub trace: String,
    pub level: String,
}

/// A single stat sample, value pre-formatted as text
#[derive(Debug, Clone, PartialEq)]
pub struct StatEntry {
    /// Seconds since the collector started
    pub timestamp: f64,
    pub key: String,
    pub value: String,
}

/// Batch of logs and stats returned by one stream read
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Pack {
    pub logs: Vec<LogEntry>,
    pub stats: Vec<StatEntry>,
}

impl Pack {
    pub fn is_empty(&self) -> bool {
        self.logs.is_empty() && self.stats.is_empty()
    }

    /// Total number of entries
    pub fn len(&self) -> usize {
        self.logs.len() + self.stats.len()
    }

    /// Append another pack, keeping order
    pub fn extend(&mut self, other: Pack) {
        self.logs.extend(other.logs);
        self.stats.extend(other.stats);
    }
}

/// Per-reader read position into a collector buffer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Cursor {
    pub log_index: usize,
    pub stat_index: usize,
}

/// Unwrap a record (or map) value, rejecting anything else
fn into_record(value: Value, what: &'static str) -> Result<Value, DecodeError> {
    match value {
        Value::Record(_) | Value::Map(_) => Ok(value),
        other => Err(DecodeError::TypeMismatch {
            expected: what,
            found: other.kind(),
        }),
    }
}

fn field<T: WireFormat>(record: &mut Value, name: &str) -> Result<T, DecodeError> {
    T::from_value(record.take(name).unwrap_or(Value::Null))
}

/// Strings absent on the wire read as empty
fn text_field(record: &mut Value, name: &str) -> Result<String, DecodeError> {
    Ok(field::<Option<String>>(record, name)?.unwrap_or_default())
}

impl WireFormat for LogEntry {
    fn shape() -> Shape {
        Shape::record([
            ("time", Shape::Float),
            ("logString", Shape::Str),
            ("stackTrace", Shape::Str),
            ("type", Shape::Str),
        ])
    }

    fn to_value(&self) -> Value {
        Value::record([
            ("time", Value::Float(self.timestamp)),
            ("logString", Value::from(self.message.as_str())),
            ("stackTrace", Value::from(self.trace.as_str())),
            ("type", Value::from(self.level.as_str())),
        ])
    }

    fn from_value(value: Value) -> Result<Self, DecodeError> {
        let mut record = into_record(value, "log entry")?;
        Ok(Self {
            timestamp: field(&mut record, "time")?,
            message: text_field(&mut record, "logString")?,
            trace: text_field(&mut record, "stackTrace")?,
            level: text_field(&mut record, "type")?,
        })
    }
}

impl WireFormat for StatEntry {
    fn shape() -> Shape {
        Shape::record([
            ("time", Shape::Float),
            ("key", Shape::Str),
            ("value", Shape::Str),
        ])
    }

    fn to_value(&self) -> Value {
        Value::record([
            ("time", Value::Float(self.timestamp)),
            ("key", Value::from(self.key.as_str())),
            ("value", Value::from(self.value.as_str())),
        ])
    }

    fn from_value(value: Value) -> Result<Self, DecodeError> {
        let mut record = into_record(value, "stat entry")?;
        Ok(Self {
            timestamp: field(&mut record, "time")?,
            key: text_field(&mut record, "key")?,
            value: text_field(&mut record, "value")?,
        })
    }
}

impl WireFormat for Pack {
    fn shape() -> Shape {
        Shape::record([
            ("logs", Vec::<LogEntry>::shape()),
            ("stats", Vec::<StatEntry>::shape()),
        ])
    }

    fn to_value(&self) -> Value {
        Value::record([("logs", self.logs.to_value()), ("stats", self.stats.to_value())])
    }

    fn from_value(value: Value) -> Result<Self, DecodeError> {
        let mut record = into_record(value, "pack")?;
        Ok(Self {
            logs: field(&mut record, "logs")?,
            stats: field(&mut record, "stats")?,
        })
    }
}

impl WireFormat for Cursor {
    fn shape() -> Shape {
        Shape::record([("logIndex", Shape::Int), ("statIndex", Shape::Int)])
    }

    fn to_value(&self) -> Value {
        Value::record([
            ("logIndex", self.log_index.to_value()),
            ("statIndex", self.stat_index.to_value()),
        ])
    }

    fn from_value(value: Value) -> Result<Self, DecodeError> {
        let mut record = into_record(value, "cursor")?;
        Ok(Self {
            log_index: field::<Option<usize>>(&mut record, "logIndex")?.unwrap_or_default(),
            stat_index: field::<Option<usize>>(&mut record, "statIndex")?.unwrap_or_default(),
        })
    }
}
