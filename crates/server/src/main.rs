mod api;
mod bootstrap;
mod health;

use std::time::Duration;

use anyhow::Result;
use tokio::sync::watch;

use inboxly_core::config::{AppConfig, LoadOptions};

fn init_logging(config: &AppConfig) {
    use inboxly_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    // Load config and initialize logging before any other operations
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;

    health::spawn(
        &app.config.server.bind_address,
        app.config.server.health_check_port,
        app.db_pool.clone(),
        health::MonitorMode::from_enabled(app.config.monitor.enabled),
    )
    .await?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let ticker_handle = if app.config.monitor.enabled {
        Some(inboxly_monitor::ticker::spawn(
            app.monitor.clone(),
            Duration::from_secs(app.config.monitor.interval_secs),
            shutdown_rx,
        ))
    } else {
        tracing::info!(
            event_name = "system.server.monitor_disabled",
            "periodic monitoring is disabled, runs only happen over http"
        );
        None
    };

    let api_address =
        format!("{}:{}", app.config.server.bind_address, app.config.server.api_port);
    let listener = tokio::net::TcpListener::bind(&api_address).await?;
    tracing::info!(
        event_name = "system.server.started",
        bind_address = %api_address,
        "inboxly-server started"
    );

    axum::serve(listener, api::router(app.api_state.clone()))
        .with_graceful_shutdown(wait_for_shutdown())
        .await?;

    tracing::info!(event_name = "system.server.stopping", "inboxly-server stopping");

    let _ = shutdown_tx.send(true);
    if let Some(handle) = ticker_handle {
        let drain = Duration::from_secs(app.config.server.graceful_shutdown_secs);
        if tokio::time::timeout(drain, handle).await.is_err() {
            tracing::warn!(
                event_name = "system.server.ticker_drain_timeout",
                "monitor ticker did not stop within the graceful shutdown window"
            );
        }
    }

    Ok(())
}

async fn wait_for_shutdown() {
    let _ = tokio::signal::ctrl_c().await;
}
