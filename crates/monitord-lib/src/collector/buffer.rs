//! Staging queue and main buffer
//!
//! This module provides:
//! - `LogSink`, a cloneable handle any thread can push log entries through
//! - `CollectorBuffer`, the consumer-owned buffer entries are merged into

use crate::models::{LogEntry, StatEntry};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

/// Thread-safe ingestion handle for log entries
///
/// Holds the staging queue shared with its `CollectorBuffer`. The lock is
/// held only long enough to append or to swap the queue out.
#[derive(Debug, Clone)]
pub struct LogSink {
    staging: Arc<Mutex<Vec<LogEntry>>>,
    enabled: Arc<AtomicBool>,
    epoch: Instant,
}

impl LogSink {
    fn new(epoch: Instant) -> Self {
        Self {
            staging: Arc::new(Mutex::new(Vec::new())),
            enabled: Arc::new(AtomicBool::new(true)),
            epoch,
        }
    }

    /// Record a log line, stamped with the current time
    ///
    /// Returns false when log collection is switched off.
    pub fn ingest(
        &self,
        message: impl Into<String>,
        trace: impl Into<String>,
        level: impl Into<String>,
    ) -> bool {
        if !self.is_enabled() {
            return false;
        }
        // Build the entry before taking the lock
        let entry = LogEntry {
            timestamp: self.now(),
            message: message.into(),
            trace: trace.into(),
            level: level.into(),
        };
        self.staging().push(entry);
        true
    }

    /// Append a prebuilt entry to the staging queue
    pub fn push(&self, entry: LogEntry) {
        self.staging().push(entry);
    }

    /// Seconds elapsed since the collector epoch
    pub fn now(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64()
    }

    pub fn epoch(&self) -> Instant {
        self.epoch
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    /// Number of entries waiting for the next merge
    pub fn pending(&self) -> usize {
        self.staging().len()
    }

    fn drain(&self) -> Vec<LogEntry> {
        std::mem::take(&mut *self.staging())
    }

    fn staging(&self) -> MutexGuard<'_, Vec<LogEntry>> {
        // A producer that panicked mid-push cannot leave a half-written Vec
        self.staging.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Ordered log and stat buffer owned by the consumer thread
#[derive(Debug)]
pub struct CollectorBuffer {
    sink: LogSink,
    logs: Vec<LogEntry>,
    stats: Vec<StatEntry>,
}

impl Default for CollectorBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl CollectorBuffer {
    pub fn new() -> Self {
        Self::with_epoch(Instant::now())
    }

    /// Create a buffer whose timestamps count from `epoch`
    pub fn with_epoch(epoch: Instant) -> Self {
        Self {
            sink: LogSink::new(epoch),
            logs: Vec::new(),
            stats: Vec::new(),
        }
    }

    /// Handle for producers on other threads
    pub fn sink(&self) -> LogSink {
        self.sink.clone()
    }

    /// Stage a log entry; callable through any clone of the sink
    pub fn ingest(&self, entry: LogEntry) {
        self.sink.push(entry);
    }

    /// Move every staged entry into the main buffer, in arrival order
    ///
    /// Returns the number of entries moved.
    pub fn merge_tick(&mut self) -> usize {
        let staged = self.sink.drain();
        let moved = staged.len();
        self.logs.extend(staged);
        moved
    }

    /// Append a stat produced on the consumer thread
    pub fn add_stat(&mut self, entry: StatEntry) {
        self.stats.push(entry);
    }

    pub fn logs(&self) -> &[LogEntry] {
        &self.logs
    }

    pub fn stats(&self) -> &[StatEntry] {
        &self.stats
    }

    /// Total number of merged entries
    pub fn len(&self) -> usize {
        self.logs.len() + self.stats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.logs.is_empty() && self.stats.is_empty()
    }

    /// Swap the log buffer out for an empty one
    pub fn take_logs(&mut self) -> Vec<LogEntry> {
        std::mem::take(&mut self.logs)
    }

    /// Swap the stat buffer out for an empty one
    pub fn take_stats(&mut self) -> Vec<StatEntry> {
        std::mem::take(&mut self.stats)
    }

    pub(crate) fn clear(&mut self) {
        self.logs.clear();
        self.stats.clear();
    }

    /// Drop the first `logs` log entries and `stats` stat entries
    pub(crate) fn remove_prefix(&mut self, logs: usize, stats: usize) {
        self.logs.drain(..logs.min(self.logs.len()));
        self.stats.drain(..stats.min(self.stats.len()));
    }
}
