//! Synchronization with the collector service
//!
//! This module provides:
//! - `SyncClient`, an HTTP RPC client with a transport-failure retry queue
//! - The `Transport` seam, with a reqwest implementation
//! - `post_stream`, the incremental sync loop feeding stream reads upstream

mod client;
mod error;
mod stream;
mod transport;

#[cfg(test)]
mod tests;

pub use client::{ClientConfig, ClientState, SyncClient, SyncClientBuilder, DEFAULT_SERVER_HOST};
pub use error::SyncError;
pub use stream::StreamEnd;
pub use transport::{HttpTransport, OutboundRequest, Transport, TransportOutcome};
