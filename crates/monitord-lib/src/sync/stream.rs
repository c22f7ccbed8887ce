//! Incremental sync loop
//!
//! `post_stream` keeps posting whatever a producer hands it. A payload is
//! resent until the server acknowledges it, and the acknowledgement is
//! fed back into the producer to obtain the next payload.

use super::client::{decode_body, Delivery};
use super::{ClientState, SyncClient, SyncError};
use crate::codec::{pack, WireFormat};
use std::time::Duration;
use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing::{debug, info, warn};

/// Why a sync loop ended without error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEnd {
    /// The producer had nothing more to send
    Exhausted,
    /// Shutdown was requested
    Stopped,
}

impl SyncClient {
    /// Post payloads from `next` to `{root}/api/{api}` until it runs dry
    ///
    /// Each payload is packed as a single argument. On a transport failure
    /// the same payload is resent after `interval`; the producer is not
    /// consulted again until the server acknowledges it. A server error
    /// aborts the session and is returned. After each acknowledgement the
    /// loop waits `interval` before asking for the next payload.
    ///
    /// Shutdown is observed only between exchanges, so a request already
    /// in flight always completes and is classified. A payload that failed
    /// at the transport when shutdown arrives goes to the retry queue.
    pub async fn post_stream<P, S, F>(
        &mut self,
        api: &str,
        mut next: F,
        interval: Duration,
        initial: S,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<StreamEnd, SyncError>
    where
        P: WireFormat,
        S: WireFormat,
        F: FnMut(&S) -> Option<P>,
    {
        if self.url_root().is_none() {
            return Err(SyncError::NotConnected);
        }
        self.set_state(ClientState::Connected);
        info!(api = %api, interval_ms = interval.as_millis() as u64, "Starting sync stream");

        let shape = S::shape();
        let mut status = initial;
        let mut delivered = 0u64;

        loop {
            if stop_requested(&mut shutdown) {
                return Ok(StreamEnd::Stopped);
            }
            let Some(payload) = next(&status) else {
                info!(api = %api, delivered = delivered, "Sync stream exhausted");
                return Ok(StreamEnd::Exhausted);
            };
            let request = self.build_request(api, pack(&[payload.to_value()])?)?;

            let body = loop {
                match self.deliver(&request).await {
                    Ok(Delivery::Delivered(body)) => break body,
                    Ok(Delivery::Unreachable(reason)) => {
                        if !pause(interval, &mut shutdown).await {
                            self.queue_retry(request, &reason);
                            return Ok(StreamEnd::Stopped);
                        }
                        warn!(api = %api, error = %reason, "Sync payload not delivered, resending");
                    }
                    Err(e) => {
                        self.set_state(ClientState::Aborted);
                        return Err(e);
                    }
                }
            };

            delivered += 1;
            status = S::from_value(decode_body(&body, &shape)?)?;
            debug!(api = %api, delivered = delivered, "Sync payload acknowledged");

            if !pause(interval, &mut shutdown).await {
                return Ok(StreamEnd::Stopped);
            }
        }
    }
}

fn stop_requested(shutdown: &mut broadcast::Receiver<()>) -> bool {
    !matches!(shutdown.try_recv(), Err(TryRecvError::Empty))
}

/// Sleep for `interval`; false if shutdown arrived first
async fn pause(interval: Duration, shutdown: &mut broadcast::Receiver<()>) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(interval) => true,
        _ = shutdown.recv() => false,
    }
}
