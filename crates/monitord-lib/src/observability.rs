//! Observability infrastructure for the telemetry client
//!
//! Provides:
//! - Prometheus metrics (request outcomes and latency, retry queue depth, buffer size)
//! - Structured JSON logging with tracing

use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, register_int_gauge,
    Encoder, Histogram, IntCounter, IntCounterVec, IntGauge, TextEncoder,
};
use std::sync::OnceLock;
use tracing::{error, info, warn};

/// Histogram buckets for request latency (in seconds)
const LATENCY_BUCKETS: &[f64] = &[0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<ClientMetricsInner> = OnceLock::new();

/// Inner metrics structure that holds the actual Prometheus metrics
struct ClientMetricsInner {
    requests: IntCounterVec,
    request_latency_seconds: Histogram,
    pending_retries: IntGauge,
    replayed_requests: IntCounter,
    buffered_logs: IntGauge,
    buffered_stats: IntGauge,
    merged_logs: IntCounter,
}

impl ClientMetricsInner {
    fn new() -> Self {
        Self {
            requests: register_int_counter_vec!(
                "monitord_requests_total",
                "Requests sent to the collector, by outcome",
                &["outcome"]
            )
            .expect("Failed to register requests_total"),

            request_latency_seconds: register_histogram!(
                "monitord_request_latency_seconds",
                "Time from sending a request to its completion",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register request_latency_seconds"),

            pending_retries: register_int_gauge!(
                "monitord_pending_retries",
                "Requests waiting in the retry queue"
            )
            .expect("Failed to register pending_retries"),

            replayed_requests: register_int_counter!(
                "monitord_replayed_requests_total",
                "Requests replayed from the retry queue"
            )
            .expect("Failed to register replayed_requests_total"),

            buffered_logs: register_int_gauge!(
                "monitord_buffered_logs",
                "Log entries held in the collector buffer"
            )
            .expect("Failed to register buffered_logs"),

            buffered_stats: register_int_gauge!(
                "monitord_buffered_stats",
                "Stat entries held in the collector buffer"
            )
            .expect("Failed to register buffered_stats"),

            merged_logs: register_int_counter!(
                "monitord_merged_logs_total",
                "Log entries moved from the staging queue into the buffer"
            )
            .expect("Failed to register merged_logs_total"),
        }
    }
}

/// Client metrics for Prometheus exposition
///
/// This is a lightweight handle to the global metrics instance.
/// Multiple clones share the same underlying metrics.
#[derive(Clone)]
pub struct ClientMetrics {
    _private: (),
}

impl Default for ClientMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(ClientMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &ClientMetricsInner {
        GLOBAL_METRICS.get_or_init(ClientMetricsInner::new)
    }

    /// Count a completed request (`success`, `transport_failure`, `server_error`)
    pub fn inc_request(&self, outcome: &str) {
        self.inner().requests.with_label_values(&[outcome]).inc();
    }

    pub fn observe_request_latency(&self, duration_secs: f64) {
        self.inner().request_latency_seconds.observe(duration_secs);
    }

    pub fn set_pending_retries(&self, count: i64) {
        self.inner().pending_retries.set(count);
    }

    pub fn inc_replays(&self, count: u64) {
        self.inner().replayed_requests.inc_by(count);
    }

    /// Update buffer size metrics
    pub fn set_buffered(&self, logs: i64, stats: i64) {
        self.inner().buffered_logs.set(logs);
        self.inner().buffered_stats.set(stats);
    }

    pub fn inc_merged_logs(&self, count: u64) {
        self.inner().merged_logs.inc_by(count);
    }

    /// Registered metrics in the Prometheus text exposition format
    pub fn render(&self) -> Result<Vec<u8>, prometheus::Error> {
        self.inner();
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&prometheus::gather(), &mut buffer)?;
        Ok(buffer)
    }
}

/// Structured logger for client lifecycle events
#[derive(Clone)]
pub struct StructuredLogger {
    device: String,
}

impl StructuredLogger {
    pub fn new(device: impl Into<String>) -> Self {
        Self {
            device: device.into(),
        }
    }

    /// Log agent startup
    pub fn log_startup(&self, version: &str, server_host: &str) {
        info!(
            event = "agent_started",
            device = %self.device,
            agent_version = %version,
            server_host = %server_host,
            "Telemetry agent started"
        );
    }

    /// Log agent shutdown
    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "agent_shutdown",
            device = %self.device,
            reason = %reason,
            "Telemetry agent shutting down"
        );
    }

    /// Log sync status with the collector
    pub fn log_sync_status(&self, connected: bool, pending_retries: usize, buffered_items: usize) {
        if connected {
            info!(
                event = "sync_status",
                device = %self.device,
                connected = true,
                pending_retries = pending_retries,
                buffered_items = buffered_items,
                "Synced with collector"
            );
        } else {
            warn!(
                event = "sync_status",
                device = %self.device,
                connected = false,
                pending_retries = pending_retries,
                buffered_items = buffered_items,
                "Collector unreachable, holding data locally"
            );
        }
    }

    /// Log a sync session ended by a server error
    pub fn log_sync_aborted(&self, status: Option<u16>, reason: &str) {
        error!(
            event = "sync_aborted",
            device = %self.device,
            status = ?status,
            reason = %reason,
            "Sync session aborted"
        );
    }
}
