//! Consumer-thread tasks: the tick loop and the sync loop
//!
//! Both run as local tasks on one thread and share the `Reporter`.

use monitord_lib::health::{
    buffer_health, collector_health, components, sync_health, ComponentHealth, HealthRegistry,
};
use monitord_lib::Reporter;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

/// Tick the reporter every `period` until shutdown
pub async fn run_ticker(
    reporter: Reporter,
    health: HealthRegistry,
    period: Duration,
    buffer_soft_limit: usize,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    info!(period_ms = period.as_millis() as u64, "Starting tick loop");

    loop {
        tokio::select! {
            _ = interval.tick() => {
                reporter.tick();
                health
                    .update(components::COLLECTOR, reporter_collector_health(&reporter))
                    .await;
                health
                    .update(
                        components::BUFFER,
                        buffer_health(reporter.buffered(), buffer_soft_limit),
                    )
                    .await;
            }
            _ = shutdown.recv() => {
                info!("Tick loop shutting down");
                break;
            }
        }
    }
}

fn reporter_collector_health(reporter: &Reporter) -> ComponentHealth {
    let collector = reporter.collector();
    let collector = collector.borrow();
    collector_health(
        collector.is_enabled(),
        collector.sink().is_enabled(),
        collector.config().collecting_log,
    )
}

/// Run sync sessions until shutdown, restarting after `restart_delay` when
/// a session ends with an error
pub async fn run_sync(
    reporter: Reporter,
    health: HealthRegistry,
    restart_delay: Duration,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut client = match reporter.build_client() {
        Ok(client) => client,
        Err(e) => {
            error!(error = %e, "Cannot create sync client");
            health
                .update(components::SYNC_CLIENT, ComponentHealth::unhealthy(e.to_string()))
                .await;
            return;
        }
    };
    health
        .update(
            components::SYNC_CLIENT,
            sync_health(client.state(), client.pending_retries()),
        )
        .await;

    loop {
        let result = reporter
            .sync_collections(&mut client, shutdown.resubscribe())
            .await;
        health
            .update(
                components::SYNC_CLIENT,
                sync_health(client.state(), client.pending_retries()),
            )
            .await;

        if let Err(e) = result {
            warn!(
                error = %e,
                delay_ms = restart_delay.as_millis() as u64,
                "Restarting sync session"
            );
            let restart = tokio::select! {
                _ = tokio::time::sleep(restart_delay) => true,
                _ = shutdown.recv() => false,
            };
            if restart {
                continue;
            }
        }
        break;
    }
    info!("Sync loop shutting down");
}
