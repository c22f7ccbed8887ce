//! Telemetry agent
//!
//! Collects log lines from stdin and its own tracing events, samples
//! process statistics on a fixed tick, and ships everything to the
//! collector service.

use anyhow::{Context, Result};
use monitord_agent::{api, config::AgentConfig, input, runtime};
use monitord_lib::{
    collector::CaptureLayer,
    health::{components, HealthRegistry},
    observability::{ClientMetrics, StructuredLogger},
    Reporter,
};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::LocalSet;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const AGENT_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let config = AgentConfig::load()?;
    let reporter = Reporter::new(config.reporter_config());

    // JSON output plus capture of the agent's own events
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .with(
            config
                .capture_tracing
                .then(|| CaptureLayer::new(reporter.sink())),
        )
        .init();

    let logger = StructuredLogger::new(reporter.config().device_key.clone());
    logger.log_startup(AGENT_VERSION, &config.server_host);
    let settings = reporter.describe();
    info!(settings = %settings, "Reporter configured");

    // Initialize health registry
    let health_registry = HealthRegistry::new();
    health_registry.register(components::COLLECTOR).await;
    health_registry.register(components::SYNC_CLIENT).await;
    health_registry.register(components::BUFFER).await;

    let app_state = Arc::new(api::AppState::new(
        health_registry.clone(),
        ClientMetrics::new(),
        settings,
    ));
    let api_port = config.api_port;
    tokio::spawn(async move {
        if let Err(e) = api::serve(api_port, app_state).await {
            error!(error = %e, "API server stopped");
        }
    });

    reporter.enable();
    input::spawn_stdin_reader(reporter.sink()).context("failed to start stdin reader")?;

    let (shutdown_tx, _) = broadcast::channel(1);
    let local = LocalSet::new();
    local
        .run_until(async {
            let ticker = tokio::task::spawn_local(runtime::run_ticker(
                reporter.clone(),
                health_registry.clone(),
                config.tick_interval(),
                config.buffer_soft_limit,
                shutdown_tx.subscribe(),
            ));
            let sync = tokio::task::spawn_local(runtime::run_sync(
                reporter.clone(),
                health_registry.clone(),
                reporter.config().sync_interval,
                shutdown_tx.subscribe(),
            ));

            // Mark agent as ready after initialization
            health_registry.set_ready(true).await;

            // Wait for shutdown signal
            tokio::signal::ctrl_c().await?;
            logger.log_shutdown("SIGINT received");
            let _ = shutdown_tx.send(());

            let _ = ticker.await;
            let _ = sync.await;
            reporter.disable();
            info!(buffered = reporter.buffered(), "Shut down");
            Ok::<(), anyhow::Error>(())
        })
        .await
}
