//! Network seam for the sync client
//!
//! A transport performs one POST and reports how it completed. It does not
//! interpret status codes; classification happens in the client.

use super::SyncError;
use async_trait::async_trait;
use std::time::Duration;

/// A fully built request, kept intact for replay
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl OutboundRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// How a single exchange completed
#[derive(Debug, Clone, PartialEq)]
pub enum TransportOutcome {
    /// No response reached us (refused, reset, timed out)
    Failed(String),
    /// A response arrived, whatever its status
    Response { status: u16, body: String },
}

/// Performs HTTP POSTs on behalf of the sync client
#[async_trait]
pub trait Transport: Send + Sync {
    async fn post(&self, request: &OutboundRequest) -> TransportOutcome;
}

/// reqwest-backed transport
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Build a transport whose requests give up after `timeout`
    pub fn new(timeout: Duration) -> Result<Self, SyncError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SyncError::Config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post(&self, request: &OutboundRequest) -> TransportOutcome {
        let mut builder = self.client.post(&request.url).body(request.body.clone());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) => return TransportOutcome::Failed(e.to_string()),
        };
        let status = response.status().as_u16();
        match response.text().await {
            Ok(body) => TransportOutcome::Response { status, body },
            // The body never fully arrived
            Err(e) => TransportOutcome::Failed(e.to_string()),
        }
    }
}
