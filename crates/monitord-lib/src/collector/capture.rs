//! Forward host `tracing` events into a collector
//!
//! `CaptureLayer` plays the role of a threaded log callback: it may be
//! invoked from any thread and only ever touches the staging queue.
//!
//! # Usage
//!
//! ```rust,ignore
//! use tracing_subscriber::prelude::*;
//!
//! let layer = CaptureLayer::new(collector.sink());
//! tracing_subscriber::registry()
//!     .with(tracing_subscriber::fmt::layer())
//!     .with(layer)
//!     .init();
//! ```

use super::LogSink;
use crate::models::level;
use std::fmt::{self, Write};
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

/// Target prefix of this crate's own events, never captured
const OWN_TARGET: &str = "monitord_lib";

/// A `tracing_subscriber` layer feeding events to a `LogSink`
#[derive(Debug, Clone)]
pub struct CaptureLayer {
    sink: LogSink,
}

impl CaptureLayer {
    pub fn new(sink: LogSink) -> Self {
        Self { sink }
    }
}

/// Map a tracing level to the collector's level names
pub fn level_name(level: &Level) -> &'static str {
    match *level {
        Level::ERROR => level::ERROR,
        Level::WARN => level::WARNING,
        _ => level::LOG,
    }
}

impl<S> Layer<S> for CaptureLayer
where
    S: Subscriber,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        // Sync traffic logs through here too; capturing it would loop
        if metadata.target().starts_with(OWN_TARGET) || !self.sink.is_enabled() {
            return;
        }

        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);

        let trace = match (metadata.file(), metadata.line()) {
            (Some(file), Some(line)) => format!("{} ({}:{})", metadata.target(), file, line),
            _ => metadata.target().to_string(),
        };
        self.sink
            .ingest(visitor.finish(), trace, level_name(metadata.level()));
    }
}

/// Collects the `message` field followed by `key=value` pairs
#[derive(Default)]
struct MessageVisitor {
    message: String,
    fields: String,
}

impl MessageVisitor {
    fn finish(self) -> String {
        if self.fields.is_empty() {
            self.message
        } else if self.message.is_empty() {
            self.fields
        } else {
            format!("{} {}", self.message, self.fields)
        }
    }

    fn push_field(&mut self, field: &Field, value: fmt::Arguments<'_>) {
        if !self.fields.is_empty() {
            self.fields.push(' ');
        }
        let _ = write!(self.fields, "{}={}", field.name(), value);
    }
}

impl Visit for MessageVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message.push_str(value);
        } else {
            self.push_field(field, format_args!("{}", value));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            let _ = write!(self.message, "{:?}", value);
        } else {
            self.push_field(field, format_args!("{:?}", value));
        }
    }
}
