//! HTTP RPC client with a transport-failure retry queue
//!
//! This module provides a client that:
//! - Packs positional arguments into one JSON body per call
//! - Queues requests that never reached the server and replays them on reconnect
//! - Reports server errors to the caller without requeueing them

use super::transport::{HttpTransport, OutboundRequest, Transport, TransportOutcome};
use super::SyncError;
use crate::codec::{decode, pack, Shape, Value};
use crate::observability::ClientMetrics;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Default collector host
pub const DEFAULT_SERVER_HOST: &str = "https://dbg.ihuman.cc";

/// Value of the client-origin marker header
const CLIENT_MARK: &str = "client";

/// Configuration for the sync client
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server root, e.g. "https://collector.example.com"
    pub endpoint: String,
    /// Optional port appended to the root
    pub port: Option<u16>,
    /// Application identity
    pub app_key: String,
    /// Device identity, sent as the request token
    pub device_key: String,
    /// Human-readable device name
    pub show_name: String,
    /// Per-request timeout enforced by the HTTP transport
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_SERVER_HOST.to_string(),
            port: None,
            app_key: "unknown".to_string(),
            device_key: "unknown".to_string(),
            show_name: "unknown".to_string(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Connection state of a [`SyncClient`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    Disconnected,
    Connected,
    /// One request in flight
    Sending,
    /// A server error ended the current sync session
    Aborted,
}

/// Result of classifying one completed exchange
pub(crate) enum Delivery {
    Delivered(String),
    Unreachable(String),
}

/// RPC client for the collector service
pub struct SyncClient {
    config: ClientConfig,
    transport: Arc<dyn Transport>,
    url_root: Option<String>,
    retry_queue: Vec<OutboundRequest>,
    state: ClientState,
    metrics: ClientMetrics,
}

impl SyncClient {
    /// Create a disconnected client over the given transport
    pub fn new(config: ClientConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            config,
            transport,
            url_root: None,
            retry_queue: Vec::new(),
            state: ClientState::Disconnected,
            metrics: ClientMetrics::new(),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn state(&self) -> ClientState {
        self.state
    }

    /// Root URL requests are sent to, once connected
    pub fn url_root(&self) -> Option<&str> {
        self.url_root.as_deref()
    }

    /// Requests waiting for the next reconnect
    pub fn pending_retries(&self) -> usize {
        self.retry_queue.len()
    }

    /// Connected with nothing left to replay
    pub fn is_connected(&self) -> bool {
        self.url_root.is_some() && self.retry_queue.is_empty()
    }

    /// Set the identity headers sent with every new request
    pub fn set_identity(
        &mut self,
        app_key: impl Into<String>,
        device_key: impl Into<String>,
        show_name: impl Into<String>,
    ) {
        self.config.app_key = app_key.into();
        self.config.device_key = device_key.into();
        self.config.show_name = show_name.into();
    }

    /// Point the client at `host` (plus optional port), with an empty retry queue
    pub fn connect(&mut self, host: &str, port: Option<u16>) -> Result<(), SyncError> {
        let host = host.trim().trim_end_matches('/');
        if host.is_empty() {
            return Err(SyncError::Config("server host is empty".to_string()));
        }
        let root = match port {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        };
        url::Url::parse(&root)
            .map_err(|e| SyncError::Config(format!("invalid server host {}: {}", root, e)))?;

        info!(event = "sync_connected", url_root = %root, "Connected to collector");
        self.config.endpoint = host.to_string();
        self.config.port = port;
        self.url_root = Some(root);
        self.retry_queue.clear();
        self.metrics.set_pending_retries(0);
        self.state = ClientState::Connected;
        Ok(())
    }

    /// Drop the connection and any queued retries
    pub fn disconnect(&mut self) {
        if !self.retry_queue.is_empty() {
            warn!(
                dropped = self.retry_queue.len(),
                "Disconnecting with unsent requests"
            );
        }
        self.url_root = None;
        self.retry_queue.clear();
        self.metrics.set_pending_retries(0);
        self.state = ClientState::Disconnected;
        info!(event = "sync_disconnected", "Disconnected from collector");
    }

    /// Replay every queued request
    ///
    /// The queue is emptied before the replay starts; requests that fail at
    /// the transport again are queued anew. Server errors are logged and
    /// dropped. Returns the number of requests replayed.
    pub async fn reconnect(&mut self) -> Result<usize, SyncError> {
        if self.url_root.is_none() {
            return Err(SyncError::NotConnected);
        }
        if self.state == ClientState::Aborted {
            self.state = ClientState::Connected;
        }

        let pending = std::mem::take(&mut self.retry_queue);
        let replayed = pending.len();
        if replayed > 0 {
            info!(requests = replayed, "Replaying queued requests");
            self.metrics.inc_replays(replayed as u64);
        }

        for request in pending {
            // Failures are queued or logged inside; nothing to surface
            let _ = self.dispatch(request, true).await;
        }
        Ok(replayed)
    }

    /// Call `method` with retry enabled
    ///
    /// Reconnects first if requests are pending. Returns `None` when the
    /// request could not reach the server and was queued for replay.
    pub async fn send(
        &mut self,
        method: &str,
        args: &[Value],
        shape: &Shape,
    ) -> Result<Option<Value>, SyncError> {
        if !self.is_connected() {
            self.reconnect().await?;
        }
        let request = self.build_request(method, pack(args)?)?;
        match self.dispatch(request, true).await? {
            Some(body) => decode_body(&body, shape).map(Some),
            None => Ok(None),
        }
    }

    /// Call `method` with retry disabled, surfacing transport failures
    pub async fn call(
        &mut self,
        method: &str,
        args: &[Value],
        shape: &Shape,
    ) -> Result<Value, SyncError> {
        let request = self.build_request(method, pack(args)?)?;
        match self.deliver(&request).await? {
            Delivery::Delivered(body) => decode_body(&body, shape),
            Delivery::Unreachable(reason) => Err(SyncError::Transport(reason)),
        }
    }

    /// Build a POST to `{root}/api/{method}` with the standard headers
    pub fn build_request(&self, method: &str, body: String) -> Result<OutboundRequest, SyncError> {
        let root = self.url_root.as_ref().ok_or(SyncError::NotConnected)?;
        let headers = [
            ("Content-Type", "application/json"),
            ("Accept", "application/json"),
            ("C-App-Key", self.config.app_key.as_str()),
            ("C-Token", self.config.device_key.as_str()),
            ("C-Show-Name", self.config.show_name.as_str()),
            ("C-Mark", CLIENT_MARK),
        ];
        Ok(OutboundRequest {
            url: format!("{}/api/{}", root, method),
            headers: headers
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            body,
        })
    }

    /// Send one request and classify the outcome
    ///
    /// With `retry`, a transport failure queues the request and yields
    /// `Ok(None)`.
    async fn dispatch(
        &mut self,
        request: OutboundRequest,
        retry: bool,
    ) -> Result<Option<String>, SyncError> {
        match self.deliver(&request).await? {
            Delivery::Delivered(body) => Ok(Some(body)),
            Delivery::Unreachable(reason) if retry => {
                self.queue_retry(request, &reason);
                Ok(None)
            }
            Delivery::Unreachable(reason) => Err(SyncError::Transport(reason)),
        }
    }

    /// Perform one exchange; server errors come back as `Err`
    pub(crate) async fn deliver(&mut self, request: &OutboundRequest) -> Result<Delivery, SyncError> {
        self.state = ClientState::Sending;
        let started = Instant::now();
        let outcome = self.transport.post(request).await;
        self.metrics
            .observe_request_latency(started.elapsed().as_secs_f64());
        self.state = ClientState::Connected;

        match outcome {
            TransportOutcome::Failed(reason) => {
                self.metrics.inc_request("transport_failure");
                Ok(Delivery::Unreachable(reason))
            }
            TransportOutcome::Response { status, body } if (200..300).contains(&status) => {
                self.metrics.inc_request("success");
                debug!(url = %request.url, status = status, "Request delivered");
                Ok(Delivery::Delivered(body))
            }
            TransportOutcome::Response { status, body } => {
                self.metrics.inc_request("server_error");
                error!(
                    url = %request.url,
                    status = status,
                    body = %body,
                    "Server rejected request"
                );
                Err(SyncError::Server { status, body })
            }
        }
    }

    /// Hold a request that never reached the server for the next reconnect
    pub(crate) fn queue_retry(&mut self, request: OutboundRequest, reason: &str) {
        warn!(
            url = %request.url,
            error = %reason,
            "Request failed to reach server, queued for retry"
        );
        self.retry_queue.push(request);
        self.metrics.set_pending_retries(self.retry_queue.len() as i64);
    }

    pub(crate) fn set_state(&mut self, state: ClientState) {
        self.state = state;
    }
}

/// Decode a response body; an empty body reads as null
pub(crate) fn decode_body(body: &str, shape: &Shape) -> Result<Value, SyncError> {
    if body.trim().is_empty() {
        return Ok(Value::Null);
    }
    Ok(decode(body, shape)?)
}

/// Builder for SyncClient configuration
pub struct SyncClientBuilder {
    config: ClientConfig,
    transport: Option<Arc<dyn Transport>>,
    connect: bool,
}

impl Default for SyncClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncClientBuilder {
    pub fn new() -> Self {
        Self {
            config: ClientConfig::default(),
            transport: None,
            connect: false,
        }
    }

    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.endpoint = endpoint.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.config.port = Some(port);
        self
    }

    pub fn identity(
        mut self,
        app_key: impl Into<String>,
        device_key: impl Into<String>,
        show_name: impl Into<String>,
    ) -> Self {
        self.config.app_key = app_key.into();
        self.config.device_key = device_key.into();
        self.config.show_name = show_name.into();
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    /// Use a custom transport instead of HTTP
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Connect to the configured endpoint as part of `build`
    pub fn connect(mut self) -> Self {
        self.connect = true;
        self
    }

    pub fn build(self) -> Result<SyncClient, SyncError> {
        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(HttpTransport::new(self.config.request_timeout)?),
        };
        let endpoint = self.config.endpoint.clone();
        let port = self.config.port;

        let mut client = SyncClient::new(self.config, transport);
        if self.connect {
            client.connect(&endpoint, port)?;
        }
        Ok(client)
    }
}
