//! Sync error taxonomy

use crate::codec::{DecodeError, EncodeError};
use thiserror::Error;

/// Errors surfaced by [`SyncClient`](super::SyncClient)
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("failed to encode request: {0}")]
    Encode(#[from] EncodeError),

    #[error("failed to decode response: {0}")]
    Decode(#[from] DecodeError),

    /// No response reached us and the call had retry disabled
    #[error("transport failure: {0}")]
    Transport(String),

    /// The server answered with a failure status
    #[error("server returned {status}: {body}")]
    Server { status: u16, body: String },

    #[error("invalid client configuration: {0}")]
    Config(String),

    #[error("client is not connected")]
    NotConnected,
}

impl SyncError {
    /// Server status code, if this is a server error
    pub fn status(&self) -> Option<u16> {
        match self {
            SyncError::Server { status, .. } => Some(*status),
            _ => None,
        }
    }
}
