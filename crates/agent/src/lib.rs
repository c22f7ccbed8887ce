//! Telemetry agent host
//!
//! Wires a `Reporter` to stdin, a fixed tick cadence, the sync loop and
//! the health/metrics API.

pub mod api;
pub mod config;
pub mod input;
pub mod runtime;
