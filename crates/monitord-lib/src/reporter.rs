//! Host-facing runtime
//!
//! `Reporter` owns a [`Collector`] and runs the sync loop that ships its
//! buffer upstream. The host drives it through three entry points:
//! `tick()` at a fixed cadence, `ingest()` from any thread, and
//! `sync_collections()` as a local task on the consumer thread.

use crate::collector::{Collector, CollectorConfig, LogSink, ProcessMemory, Stream};
use crate::codec::Value;
use crate::observability::{ClientMetrics, StructuredLogger};
use crate::sync::{StreamEnd, SyncClient, SyncClientBuilder, SyncError, DEFAULT_SERVER_HOST};
use std::cell::RefCell;
use std::fmt::Write as _;
use std::rc::Rc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{info, warn};

/// Reporter configuration
#[derive(Debug, Clone)]
pub struct ReporterConfig {
    /// Collector root, e.g. "https://collector.example.com"
    pub server_host: String,
    pub server_port: Option<u16>,
    pub app_key: String,
    pub device_key: String,
    pub device_show_name: String,
    /// Run the sync loop at all
    pub sync_enabled: bool,
    pub collecting_log: bool,
    pub collecting_fps: bool,
    pub collecting_mem: bool,
    /// Stat keys never recorded
    pub ignored_custom_tags: Vec<String>,
    /// Wait between sync exchanges
    pub sync_interval: Duration,
    /// RPC method the buffer is posted to
    pub sync_api: String,
    /// Drop already-shipped entries on each sync read
    pub clear_after_sync: bool,
    pub request_timeout: Duration,
}

impl Default for ReporterConfig {
    fn default() -> Self {
        Self {
            server_host: DEFAULT_SERVER_HOST.to_string(),
            server_port: None,
            app_key: "unknown".to_string(),
            device_key: default_device_key(),
            device_show_name: hostname(),
            sync_enabled: true,
            collecting_log: true,
            collecting_fps: true,
            collecting_mem: true,
            ignored_custom_tags: Vec::new(),
            sync_interval: Duration::from_secs(3),
            sync_api: "syncollec".to_string(),
            clear_after_sync: true,
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl ReporterConfig {
    fn collector_config(&self) -> CollectorConfig {
        CollectorConfig {
            collecting_log: self.collecting_log,
            collecting_fps: self.collecting_fps,
            collecting_mem: self.collecting_mem,
            ignored_tags: self.ignored_custom_tags.clone(),
        }
    }
}

/// Device key unique to this process: `<hostname>+<unix nanos>`
pub fn default_device_key() -> String {
    let nanos = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();
    format!("{}+{}", hostname(), nanos)
}

fn hostname() -> String {
    std::env::var("HOSTNAME")
        .ok()
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Collector plus sync loop, shared by the tasks of one consumer thread
#[derive(Clone)]
pub struct Reporter {
    config: ReporterConfig,
    collector: Rc<RefCell<Collector>>,
    /// Sync reader; outlives sessions so a restart never re-reads sent entries
    stream: Rc<RefCell<Stream>>,
    sink: LogSink,
    logger: StructuredLogger,
    metrics: ClientMetrics,
}

impl Reporter {
    /// Build a reporter sampling this process's memory
    pub fn new(config: ReporterConfig) -> Self {
        let collector =
            Collector::new(config.collector_config()).with_memory_source(ProcessMemory::new());
        Self::with_collector(config, collector)
    }

    /// Build around a prepared collector; its switches are taken from `config`
    pub fn with_collector(config: ReporterConfig, mut collector: Collector) -> Self {
        collector.set_collecting_log(config.collecting_log);
        collector.set_collecting_fps(config.collecting_fps);
        collector.set_collecting_mem(config.collecting_mem);
        collector.set_ignored_tags(config.ignored_custom_tags.clone());

        let sink = collector.sink();
        let logger = StructuredLogger::new(config.device_key.clone());
        Self {
            config,
            collector: Rc::new(RefCell::new(collector)),
            stream: Rc::new(RefCell::new(Stream::new())),
            sink,
            logger,
            metrics: ClientMetrics::new(),
        }
    }

    pub fn config(&self) -> &ReporterConfig {
        &self.config
    }

    /// Shared handle to the collector
    pub fn collector(&self) -> Rc<RefCell<Collector>> {
        Rc::clone(&self.collector)
    }

    /// Handle producers on other threads push log lines through
    pub fn sink(&self) -> LogSink {
        self.sink.clone()
    }

    pub fn enable(&self) {
        self.collector.borrow_mut().enable();
    }

    pub fn disable(&self) {
        self.collector.borrow_mut().disable();
    }

    /// Record a log line; callable from any thread holding a [`LogSink`]
    pub fn ingest(&self, message: &str, trace: &str, level: &str) -> bool {
        self.sink.ingest(message, trace, level)
    }

    /// Record a custom stat for the current tick
    pub fn add_stat(&self, key: &str, value: impl std::fmt::Display) -> bool {
        self.collector.borrow_mut().add_stat(key, value)
    }

    /// Merge staged logs and sample the built-in stats
    pub fn tick(&self) {
        let mut collector = self.collector.borrow_mut();
        let before = collector.buffer().logs().len();
        collector.tick();

        let buffer = collector.buffer();
        let merged = buffer.logs().len().saturating_sub(before);
        if merged > 0 {
            self.metrics.inc_merged_logs(merged as u64);
        }
        self.metrics
            .set_buffered(buffer.logs().len() as i64, buffer.stats().len() as i64);
    }

    /// Entries currently held by the collector buffer
    pub fn buffered(&self) -> usize {
        self.collector.borrow().buffer().len()
    }

    /// HTTP client pointed at the configured host, identity set
    pub fn build_client(&self) -> Result<SyncClient, SyncError> {
        let mut builder = SyncClientBuilder::new()
            .endpoint(self.config.server_host.clone())
            .identity(
                self.config.app_key.clone(),
                self.config.device_key.clone(),
                self.config.device_show_name.clone(),
            )
            .request_timeout(self.config.request_timeout)
            .connect();
        if let Some(port) = self.config.server_port {
            builder = builder.port(port);
        }
        builder.build()
    }

    /// Ship the buffer through `client` until shutdown
    ///
    /// Each exchange posts what the reporter's [`Stream`] has not yet
    /// read. The stream is kept across sessions: entries posted by an
    /// earlier session, whether acknowledged, rejected or queued for
    /// replay, are not posted again. The client must already be
    /// connected. An error ends the session and is returned after being
    /// logged.
    pub async fn sync_collections(
        &self,
        client: &mut SyncClient,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<StreamEnd, SyncError> {
        if !self.config.sync_enabled {
            info!("Sync disabled, buffer stays local");
            return Ok(StreamEnd::Exhausted);
        }

        let collector = Rc::clone(&self.collector);
        let metrics = self.metrics.clone();
        let clear = self.config.clear_after_sync;
        let stream = Rc::clone(&self.stream);

        let result = client
            .post_stream(
                &self.config.sync_api,
                move |_ack: &Value| {
                    let mut collector = collector.borrow_mut();
                    let pack = stream
                        .borrow_mut()
                        .read_rest(collector.buffer_mut(), clear);
                    let buffer = collector.buffer();
                    metrics.set_buffered(buffer.logs().len() as i64, buffer.stats().len() as i64);
                    Some(pack)
                },
                self.config.sync_interval,
                Value::Null,
                shutdown,
            )
            .await;

        match &result {
            Ok(end) => {
                info!(end = ?end, "Sync session finished");
                self.logger.log_sync_status(
                    client.is_connected(),
                    client.pending_retries(),
                    self.buffered(),
                );
            }
            Err(e) => {
                warn!(error = %e, "Sync session ended");
                self.logger.log_sync_aborted(e.status(), &e.to_string());
            }
        }
        result
    }

    /// Active configuration as `key:value` lines
    pub fn describe(&self) -> String {
        let collector = self.collector.borrow();
        let switches = collector.config();
        let mut out = String::new();
        let host = match self.config.server_port {
            Some(port) => format!("{}:{}", self.config.server_host, port),
            None => self.config.server_host.clone(),
        };
        let _ = writeln!(out, "serverHost:{}", host);
        let _ = writeln!(out, "appKey:{}", self.config.app_key);
        let _ = writeln!(out, "deviceKey:{}", self.config.device_key);
        let _ = writeln!(out, "deviceShowName:{}", self.config.device_show_name);
        let _ = writeln!(out, "syncEnabled:{}", self.config.sync_enabled);
        let _ = writeln!(out, "collectingLog:{}", switches.collecting_log);
        let _ = writeln!(out, "collectingFps:{}", switches.collecting_fps);
        let _ = writeln!(out, "collectingMem:{}", switches.collecting_mem);
        let _ = writeln!(out, "ignoredCustomTags:{}", switches.ignored_tags.join(","));
        let _ = write!(
            out,
            "syncInterval:{}ms",
            self.config.sync_interval.as_millis()
        );
        out
    }
}
