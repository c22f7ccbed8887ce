//! Agent configuration

use anyhow::{Context, Result};
use monitord_lib::reporter::{default_device_key, ReporterConfig};
use monitord_lib::sync::DEFAULT_SERVER_HOST;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

/// Agent configuration, read from `MONITORD_*` environment variables
#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    /// API server port for health/metrics
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Collector root URL
    #[serde(default = "default_server_host")]
    pub server_host: String,

    #[serde(default)]
    pub server_port: Option<u16>,

    #[serde(default = "default_app_key")]
    pub app_key: String,

    /// Generated per process when unset
    #[serde(default)]
    pub device_key: Option<String>,

    /// Defaults to the hostname
    #[serde(default)]
    pub device_show_name: Option<String>,

    #[serde(default = "default_true")]
    pub sync_enabled: bool,

    #[serde(default = "default_sync_api")]
    pub sync_api: String,

    #[serde(default = "default_sync_interval")]
    pub sync_interval_ms: u64,

    /// Cadence of collector ticks
    #[serde(default = "default_tick_interval")]
    pub tick_interval_ms: u64,

    #[serde(default = "default_true")]
    pub collecting_log: bool,

    #[serde(default = "default_true")]
    pub collecting_fps: bool,

    #[serde(default = "default_true")]
    pub collecting_mem: bool,

    /// Comma-separated stat keys to drop
    #[serde(default)]
    pub ignored_custom_tags: String,

    #[serde(default = "default_true")]
    pub clear_after_sync: bool,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Forward the agent's own tracing events into the buffer
    #[serde(default = "default_true")]
    pub capture_tracing: bool,

    /// Buffered entries above which the buffer reports degraded
    #[serde(default = "default_buffer_soft_limit")]
    pub buffer_soft_limit: usize,
}

fn default_api_port() -> u16 {
    8080
}

fn default_server_host() -> String {
    DEFAULT_SERVER_HOST.to_string()
}

fn default_app_key() -> String {
    "unknown".to_string()
}

fn default_true() -> bool {
    true
}

fn default_sync_api() -> String {
    "syncollec".to_string()
}

fn default_sync_interval() -> u64 {
    3000
}

fn default_tick_interval() -> u64 {
    100
}

fn default_request_timeout() -> u64 {
    30
}

fn default_buffer_soft_limit() -> usize {
    10_000
}

impl AgentConfig {
    /// Load configuration from the process environment
    pub fn load() -> Result<Self> {
        Self::from_env(config::Environment::with_prefix("MONITORD"))
    }

    /// Load configuration from an explicit variable map
    pub fn from_vars(vars: HashMap<String, String>) -> Result<Self> {
        Self::from_env(config::Environment::with_prefix("MONITORD").source(Some(vars)))
    }

    fn from_env(env: config::Environment) -> Result<Self> {
        let config = config::Config::builder()
            .add_source(env.try_parsing(true))
            .build()
            .context("failed to read MONITORD_ environment")?;

        config
            .try_deserialize()
            .context("invalid MONITORD_ configuration")
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }

    /// Reporter settings derived from this configuration
    pub fn reporter_config(&self) -> ReporterConfig {
        let defaults = ReporterConfig::default();
        ReporterConfig {
            server_host: self.server_host.clone(),
            server_port: self.server_port,
            app_key: self.app_key.clone(),
            device_key: self.device_key.clone().unwrap_or_else(default_device_key),
            device_show_name: self
                .device_show_name
                .clone()
                .unwrap_or(defaults.device_show_name),
            sync_enabled: self.sync_enabled,
            collecting_log: self.collecting_log,
            collecting_fps: self.collecting_fps,
            collecting_mem: self.collecting_mem,
            ignored_custom_tags: self
                .ignored_custom_tags
                .split(',')
                .map(str::trim)
                .filter(|tag| !tag.is_empty())
                .map(str::to_string)
                .collect(),
            sync_interval: Duration::from_millis(self.sync_interval_ms),
            sync_api: self.sync_api.clone(),
            clear_after_sync: self.clear_after_sync,
            request_timeout: Duration::from_secs(self.request_timeout_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults_without_variables() {
        let config = tokio_test::assert_ok!(AgentConfig::from_vars(HashMap::new()));

        assert_eq!(config.api_port, 8080);
        assert_eq!(config.server_host, DEFAULT_SERVER_HOST);
        assert_eq!(config.sync_api, "syncollec");
        assert!(config.sync_enabled);
        assert!(config.device_key.is_none());

        let reporter = config.reporter_config();
        assert_eq!(reporter.sync_interval, Duration::from_secs(3));
        assert!(reporter.device_key.contains('+'));
        assert!(reporter.ignored_custom_tags.is_empty());
    }

    #[test]
    fn test_variables_override_defaults() {
        let config = tokio_test::assert_ok!(AgentConfig::from_vars(vars(&[
            ("MONITORD_API_PORT", "9100"),
            ("MONITORD_SERVER_HOST", "http://collector.local"),
            ("MONITORD_SERVER_PORT", "8443"),
            ("MONITORD_APP_KEY", "bench"),
            ("MONITORD_DEVICE_KEY", "rig+1"),
            ("MONITORD_COLLECTING_FPS", "false"),
            ("MONITORD_IGNORED_CUSTOM_TAGS", "noisy, debug,,"),
            ("MONITORD_SYNC_INTERVAL_MS", "500"),
        ])));

        assert_eq!(config.api_port, 9100);
        let reporter = config.reporter_config();
        assert_eq!(reporter.server_host, "http://collector.local");
        assert_eq!(reporter.server_port, Some(8443));
        assert_eq!(reporter.app_key, "bench");
        assert_eq!(reporter.device_key, "rig+1");
        assert!(!reporter.collecting_fps);
        assert!(reporter.collecting_mem);
        assert_eq!(reporter.ignored_custom_tags, vec!["noisy", "debug"]);
        assert_eq!(reporter.sync_interval, Duration::from_millis(500));
    }

    #[test]
    fn test_invalid_value_is_an_error() {
        let result = AgentConfig::from_vars(vars(&[("MONITORD_API_PORT", "not-a-port")]));
        tokio_test::assert_err!(result);
    }
}
