//! Embedded telemetry client library
//!
//! This crate provides the core functionality for:
//! - A hand-rolled JSON codec with positional argument packing
//! - Log and stat collection with cursor-based stream readers
//! - Synchronization with a remote collector over HTTP
//! - Health checks and observability

pub mod codec;
pub mod collector;
pub mod health;
pub mod models;
pub mod observability;
pub mod reporter;
pub mod sync;

pub use health::{ComponentHealth, ComponentStatus, HealthRegistry, HealthReport, Readiness};
pub use models::*;
pub use observability::{ClientMetrics, StructuredLogger};
pub use reporter::{Reporter, ReporterConfig};
