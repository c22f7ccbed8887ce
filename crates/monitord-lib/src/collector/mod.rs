//! Log and stat collection
//!
//! This module provides:
//! - A thread-safe staging queue fed through `LogSink` handles
//! - The consumer-owned `CollectorBuffer` and cursor-based `Stream` readers
//! - `Collector`, which drives merging and sampling from the host's tick
//! - `CaptureLayer`, bridging host `tracing` events into the staging queue
//!
//! Everything except the staging queue is owned by the single consumer
//! thread that calls [`Collector::tick`].

mod buffer;
mod capture;
mod hooks;
mod sampler;
mod stream;


pub use buffer::{CollectorBuffer, LogSink};
pub use capture::{level_name, CaptureLayer};
pub use hooks::UpdateHooks;
pub use sampler::{FrameRate, MetricSource, ProcessMemory};
pub use stream::Stream;

use crate::models::StatEntry;
use std::fmt::Display;
use std::time::Instant;
use tracing::debug;

/// Stat key for the process memory sample
pub const MEM_STAT: &str = "#mem";

/// Stat key for the tick rate
pub const FPS_STAT: &str = "#fps";

const LOGS_HOOK: &str = "collector.logs";
const TIME_HOOK: &str = "collector.time";
const FPS_HOOK: &str = "collector.fps";
const MEM_HOOK: &str = "collector.mem";

/// Collection switches
#[derive(Debug, Clone, PartialEq)]
pub struct CollectorConfig {
    /// Capture log lines
    pub collecting_log: bool,
    /// Append a `#fps` stat every tick
    pub collecting_fps: bool,
    /// Append a `#mem` stat every tick
    pub collecting_mem: bool,
    /// Stat keys dropped by `add_stat`
    pub ignored_tags: Vec<String>,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            collecting_log: true,
            collecting_fps: true,
            collecting_mem: true,
            ignored_tags: Vec::new(),
        }
    }
}

/// State the per-tick hooks operate on
pub struct CollectorState {
    buffer: CollectorBuffer,
    config: CollectorConfig,
    tick_at: Instant,
    last_tick: Option<Instant>,
    current_time: f64,
    frame_rate: FrameRate,
    current_mem: Option<f64>,
    memory: Option<Box<dyn MetricSource>>,
}

impl CollectorState {
    /// Append a stat stamped with the current tick time
    ///
    /// Returns false if `key` is an ignored tag.
    pub fn add_stat(&mut self, key: &str, value: impl Display) -> bool {
        if self.config.ignored_tags.iter().any(|tag| tag == key) {
            return false;
        }
        self.buffer.add_stat(StatEntry {
            timestamp: self.current_time,
            key: key.to_string(),
            value: value.to_string(),
        });
        true
    }

    pub fn buffer(&self) -> &CollectorBuffer {
        &self.buffer
    }

    pub fn buffer_mut(&mut self) -> &mut CollectorBuffer {
        &mut self.buffer
    }

    pub fn config(&self) -> &CollectorConfig {
        &self.config
    }

    /// Seconds since the collector epoch, as of the last tick
    pub fn current_time(&self) -> f64 {
        self.current_time
    }

    pub fn current_fps(&self) -> Option<f64> {
        self.frame_rate.current()
    }

    /// Last memory sample in MiB
    pub fn current_mem(&self) -> Option<f64> {
        self.current_mem
    }

    fn update_logs(&mut self) {
        if !self.config.collecting_log {
            return;
        }
        let moved = self.buffer.merge_tick();
        if moved > 0 {
            debug!(entries = moved, "Merged staged log entries");
        }
    }

    fn update_time(&mut self) {
        self.current_time = self
            .tick_at
            .saturating_duration_since(self.buffer.sink().epoch())
            .as_secs_f64();
    }

    fn update_fps(&mut self) {
        if !self.config.collecting_fps {
            return;
        }
        if let Some(last) = self.last_tick {
            self.frame_rate
                .observe(self.tick_at.saturating_duration_since(last));
        }
    }

    fn update_mem(&mut self) {
        if !self.config.collecting_mem {
            return;
        }
        if let Some(source) = self.memory.as_mut() {
            self.current_mem = source.sample();
        }
    }
}

/// Owns a collector buffer and the hooks run on every tick
pub struct Collector {
    state: CollectorState,
    hooks: UpdateHooks<CollectorState>,
    enabled: bool,
}

impl Collector {
    pub fn new(config: CollectorConfig) -> Self {
        Self::with_buffer(config, CollectorBuffer::new())
    }

    /// Build around an existing buffer (and its epoch)
    pub fn with_buffer(config: CollectorConfig, buffer: CollectorBuffer) -> Self {
        let epoch = buffer.sink().epoch();
        buffer.sink().set_enabled(false);
        Self {
            state: CollectorState {
                buffer,
                config,
                tick_at: epoch,
                last_tick: None,
                current_time: 0.0,
                frame_rate: FrameRate::default(),
                current_mem: None,
                memory: None,
            },
            hooks: UpdateHooks::new(),
            enabled: false,
        }
    }

    /// Set the source sampled for the `#mem` stat
    pub fn with_memory_source(mut self, source: impl MetricSource + 'static) -> Self {
        self.state.memory = Some(Box::new(source));
        self
    }

    /// Install the built-in hooks and open the log sink
    ///
    /// Calling this again while enabled changes nothing.
    pub fn enable(&mut self) {
        self.hooks.register(LOGS_HOOK, CollectorState::update_logs);
        self.hooks.register(TIME_HOOK, CollectorState::update_time);
        self.hooks.register(FPS_HOOK, CollectorState::update_fps);
        self.hooks.register(MEM_HOOK, CollectorState::update_mem);
        self.state
            .buffer
            .sink()
            .set_enabled(self.state.config.collecting_log);
        self.enabled = true;
    }

    /// Remove the built-in hooks and close the log sink
    pub fn disable(&mut self) {
        for name in [LOGS_HOOK, TIME_HOOK, FPS_HOOK, MEM_HOOK] {
            self.hooks.deregister(name);
        }
        self.state.buffer.sink().set_enabled(false);
        self.enabled = false;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn tick(&mut self) {
        self.tick_at(Instant::now());
    }

    /// Run one tick as of `now`: hooks first, then the built-in stats
    ///
    /// Does nothing while disabled.
    pub fn tick_at(&mut self, now: Instant) {
        if !self.enabled {
            return;
        }
        self.state.tick_at = now;
        self.hooks.run(&mut self.state);
        self.state.last_tick = Some(now);

        let state = &mut self.state;
        if state.config.collecting_mem {
            if let Some(mem) = state.current_mem {
                state.add_stat(MEM_STAT, mem);
            }
        }
        if state.config.collecting_fps {
            if let Some(fps) = state.current_fps() {
                state.add_stat(FPS_STAT, fps);
            }
        }
    }

    /// Add a host hook, run after the built-in ones
    pub fn register_hook<F>(&mut self, name: &str, hook: F) -> bool
    where
        F: FnMut(&mut CollectorState) + 'static,
    {
        self.hooks.register(name, hook)
    }

    pub fn deregister_hook(&mut self, name: &str) -> bool {
        self.hooks.deregister(name)
    }

    pub fn hooks(&self) -> &UpdateHooks<CollectorState> {
        &self.hooks
    }

    pub fn add_stat(&mut self, key: &str, value: impl Display) -> bool {
        self.state.add_stat(key, value)
    }

    /// Ingestion handle for other threads
    pub fn sink(&self) -> LogSink {
        self.state.buffer.sink()
    }

    pub fn state(&self) -> &CollectorState {
        &self.state
    }

    pub fn buffer(&self) -> &CollectorBuffer {
        &self.state.buffer
    }

    pub fn buffer_mut(&mut self) -> &mut CollectorBuffer {
        &mut self.state.buffer
    }

    pub fn config(&self) -> &CollectorConfig {
        &self.state.config
    }

    pub fn set_collecting_log(&mut self, on: bool) {
        self.state.config.collecting_log = on;
        self.state.buffer.sink().set_enabled(self.enabled && on);
    }

    pub fn set_collecting_fps(&mut self, on: bool) {
        self.state.config.collecting_fps = on;
    }

    pub fn set_collecting_mem(&mut self, on: bool) {
        self.state.config.collecting_mem = on;
    }

    pub fn set_ignored_tags(&mut self, tags: Vec<String>) {
        self.state.config.ignored_tags = tags;
    }
}
