//! Runtime metric sampling
//!
//! This module provides:
//! - `MetricSource`, the host-supplied sampler behind the `#mem` stat
//! - `ProcessMemory`, a source reading resident memory from procfs
//! - `FrameRate`, the tick-rate estimate behind the `#fps` stat

use std::path::PathBuf;
use std::time::Duration;

/// A host-supplied metric getter
pub trait MetricSource {
    /// Current value, or `None` if unavailable this tick
    fn sample(&mut self) -> Option<f64>;
}

impl<F> MetricSource for F
where
    F: FnMut() -> Option<f64>,
{
    fn sample(&mut self) -> Option<f64> {
        self()
    }
}

/// Resident memory of the current process in MiB
#[derive(Debug, Clone)]
pub struct ProcessMemory {
    status_path: PathBuf,
}

impl Default for ProcessMemory {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessMemory {
    pub fn new() -> Self {
        Self::with_proc_path("/proc")
    }

    /// Read from a custom proc root (for testing)
    pub fn with_proc_path(proc_path: impl Into<PathBuf>) -> Self {
        Self {
            status_path: proc_path.into().join("self").join("status"),
        }
    }

    /// Parse `VmRSS` out of a `/proc/<pid>/status` file, in MiB
    pub fn parse_status(content: &str) -> Option<f64> {
        content.lines().find_map(|line| {
            let rest = line.strip_prefix("VmRSS:")?;
            let mut parts = rest.split_whitespace();
            let kib: f64 = parts.next()?.parse().ok()?;
            match parts.next() {
                Some("kB") | None => Some(kib / 1024.0),
                Some(_) => None,
            }
        })
    }
}

impl MetricSource for ProcessMemory {
    fn sample(&mut self) -> Option<f64> {
        let content = std::fs::read_to_string(&self.status_path).ok()?;
        Self::parse_status(&content)
    }
}

/// Frames per second derived from the last tick interval
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameRate {
    current: Option<f64>,
}

impl FrameRate {
    /// Record a tick interval; a zero interval keeps the previous value
    pub fn observe(&mut self, delta: Duration) -> Option<f64> {
        if !delta.is_zero() {
            self.current = Some(1.0 / delta.as_secs_f64());
        }
        self.current
    }

    pub fn current(&self) -> Option<f64> {
        self.current
    }
}
