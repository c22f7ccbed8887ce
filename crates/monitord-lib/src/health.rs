//! Component health for the agent's liveness and readiness endpoints
//!
//! Each component's health is derived from collector or sync client state
//! by the functions below and stored in a shared [`HealthRegistry`].

use crate::sync::ClientState;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Component names for health tracking
pub mod components {
    pub const COLLECTOR: &str = "collector";
    pub const SYNC_CLIENT: &str = "sync_client";
    pub const BUFFER: &str = "buffer";
}

/// Health status, ordered from best to worst
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    Healthy,
    /// Still collecting, but needs attention
    Degraded,
    Unhealthy,
}

/// One component's health at its last update
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: ComponentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Unix seconds of the update
    pub checked_at: i64,
}

impl ComponentHealth {
    fn new(status: ComponentStatus, message: Option<String>) -> Self {
        Self {
            status,
            message,
            checked_at: chrono::Utc::now().timestamp(),
        }
    }

    pub fn healthy() -> Self {
        Self::new(ComponentStatus::Healthy, None)
    }

    pub fn degraded(message: impl Into<String>) -> Self {
        Self::new(ComponentStatus::Degraded, Some(message.into()))
    }

    pub fn unhealthy(message: impl Into<String>) -> Self {
        Self::new(ComponentStatus::Unhealthy, Some(message.into()))
    }
}

/// Health of the collector from its switches
///
/// A disabled collector drops every log line, so it counts as unhealthy.
pub fn collector_health(enabled: bool, sink_open: bool, collecting_log: bool) -> ComponentHealth {
    if !enabled {
        ComponentHealth::unhealthy("Collector disabled")
    } else if collecting_log && !sink_open {
        ComponentHealth::degraded("Log sink closed while log collection is on")
    } else {
        ComponentHealth::healthy()
    }
}

/// Health of the sync client given its state and retry backlog
pub fn sync_health(state: ClientState, pending_retries: usize) -> ComponentHealth {
    match state {
        ClientState::Aborted => ComponentHealth::unhealthy("Sync session aborted by server error"),
        ClientState::Disconnected => ComponentHealth::degraded("Not connected to collector"),
        _ if pending_retries > 0 => {
            ComponentHealth::degraded(format!("{} requests waiting for replay", pending_retries))
        }
        _ => ComponentHealth::healthy(),
    }
}

/// Health of the collector buffer; degraded past `soft_limit` entries
pub fn buffer_health(entries: usize, soft_limit: usize) -> ComponentHealth {
    if entries > soft_limit {
        ComponentHealth::degraded(format!(
            "{} entries buffered, collector may be falling behind",
            entries
        ))
    } else {
        ComponentHealth::healthy()
    }
}

/// Body of the liveness endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    /// Worst status across all components
    pub status: ComponentStatus,
    pub components: BTreeMap<String, ComponentHealth>,
}

/// Body of the readiness endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Readiness {
    pub ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Default)]
struct RegistryState {
    components: BTreeMap<String, ComponentHealth>,
    ready: bool,
}

/// Shared component health, updated by the agent's tasks
#[derive(Debug, Clone, Default)]
pub struct HealthRegistry {
    state: Arc<RwLock<RegistryState>>,
}

impl HealthRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking a component as healthy
    pub async fn register(&self, name: &str) {
        self.update(name, ComponentHealth::healthy()).await;
    }

    pub async fn update(&self, name: &str, health: ComponentHealth) {
        self.state
            .write()
            .await
            .components
            .insert(name.to_string(), health);
    }

    pub async fn set_ready(&self, ready: bool) {
        self.state.write().await.ready = ready;
    }

    pub async fn health(&self) -> HealthReport {
        let state = self.state.read().await;
        let status = state
            .components
            .values()
            .map(|health| health.status)
            .max()
            .unwrap_or(ComponentStatus::Healthy);
        HealthReport {
            status,
            components: state.components.clone(),
        }
    }

    /// Ready once marked so, as long as no component is unhealthy
    pub async fn readiness(&self) -> Readiness {
        let state = self.state.read().await;
        if !state.ready {
            return Readiness {
                ready: false,
                reason: Some("Collector not yet enabled".to_string()),
            };
        }

        let failing = state
            .components
            .iter()
            .find(|(_, health)| health.status == ComponentStatus::Unhealthy);
        match failing {
            Some((name, health)) => Readiness {
                ready: false,
                reason: Some(format!(
                    "{} unhealthy: {}",
                    name,
                    health.message.as_deref().unwrap_or("no detail")
                )),
            },
            None => Readiness {
                ready: true,
                reason: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collector_health_from_switches() {
        assert_eq!(
            collector_health(true, true, true).status,
            ComponentStatus::Healthy
        );
        // Log collection off closes the sink on purpose
        assert_eq!(
            collector_health(true, false, false).status,
            ComponentStatus::Healthy
        );
        assert_eq!(
            collector_health(true, false, true).status,
            ComponentStatus::Degraded
        );
        assert_eq!(
            collector_health(false, false, true).status,
            ComponentStatus::Unhealthy
        );
    }

    #[test]
    fn test_sync_health_mapping() {
        assert_eq!(
            sync_health(ClientState::Connected, 0).status,
            ComponentStatus::Healthy
        );
        assert_eq!(
            sync_health(ClientState::Sending, 2).status,
            ComponentStatus::Degraded
        );
        assert_eq!(
            sync_health(ClientState::Disconnected, 0).status,
            ComponentStatus::Degraded
        );
        assert_eq!(
            sync_health(ClientState::Aborted, 0).status,
            ComponentStatus::Unhealthy
        );
    }

    #[test]
    fn test_buffer_health_soft_limit() {
        assert_eq!(buffer_health(100, 100).status, ComponentStatus::Healthy);
        let health = buffer_health(101, 100);
        assert_eq!(health.status, ComponentStatus::Degraded);
        assert!(health.message.unwrap().contains("101"));
    }

    #[tokio::test]
    async fn test_overall_status_is_worst_component() {
        let registry = HealthRegistry::new();
        assert_eq!(registry.health().await.status, ComponentStatus::Healthy);

        registry.register(components::COLLECTOR).await;
        registry
            .update(components::BUFFER, buffer_health(20, 10))
            .await;
        assert_eq!(registry.health().await.status, ComponentStatus::Degraded);

        registry
            .update(components::SYNC_CLIENT, sync_health(ClientState::Aborted, 0))
            .await;
        let report = registry.health().await;
        assert_eq!(report.status, ComponentStatus::Unhealthy);
        assert_eq!(report.components.len(), 3);
    }

    #[tokio::test]
    async fn test_readiness_waits_for_enable() {
        let registry = HealthRegistry::new();
        registry.register(components::COLLECTOR).await;
        assert!(!registry.readiness().await.ready);

        registry.set_ready(true).await;
        let readiness = registry.readiness().await;
        assert!(readiness.ready);
        assert!(readiness.reason.is_none());
    }

    #[tokio::test]
    async fn test_aborted_sync_blocks_readiness() {
        let registry = HealthRegistry::new();
        registry.set_ready(true).await;
        registry
            .update(components::SYNC_CLIENT, sync_health(ClientState::Aborted, 0))
            .await;
        registry
            .update(components::BUFFER, buffer_health(10, 100))
            .await;

        let readiness = registry.readiness().await;
        assert!(!readiness.ready);
        assert_eq!(
            readiness.reason.as_deref(),
            Some("sync_client unhealthy: Sync session aborted by server error")
        );
    }

    #[tokio::test]
    async fn test_disabled_collector_reported() {
        let registry = HealthRegistry::new();
        registry.set_ready(true).await;
        registry
            .update(components::COLLECTOR, collector_health(false, false, true))
            .await;

        let report = registry.health().await;
        assert_eq!(report.status, ComponentStatus::Unhealthy);
        let collector = &report.components[components::COLLECTOR];
        assert_eq!(collector.message.as_deref(), Some("Collector disabled"));
        assert!(!registry.readiness().await.ready);
    }
}
