mod bootstrap;
mod broadcast;
mod conversation;
mod health;
mod ingress;
mod numbers;
#[cfg(test)]
mod testing;
mod wit;

use std::time::Duration;

use anyhow::Result;
use triviabot_core::config::{AppConfig, LoadOptions};

fn init_logging(config: &AppConfig) {
    use tracing::Level;
    use triviabot_core::config::LogFormat::*;

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
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;

    let sweep = conversation::spawn_session_sweep(
        app.sessions.clone(),
        Duration::from_secs(app.config.conversation.session_idle_secs),
    );
    let broadcast_period = Duration::from_millis(app.config.broadcast.interval_ms);
    let broadcast = app.broadcaster.map(|broadcaster| broadcaster.spawn(broadcast_period));

    let address = format!("{}:{}", app.config.server.bind_address, app.config.server.port);
    let listener = tokio::net::TcpListener::bind(&address).await?;
    tracing::info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        bind_address = %address,
        broadcast = broadcast.is_some(),
        "triviabot-server listening"
    );

    axum::serve(listener, app.router).with_graceful_shutdown(wait_for_shutdown()).await?;

    tracing::info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        "triviabot-server stopping"
    );
    sweep.abort();
    if let Some(broadcast) = broadcast {
        broadcast.abort();
    }

    Ok(())
}

async fn wait_for_shutdown() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::error!(
            event_name = "system.server.signal_error",
            correlation_id = "shutdown",
            error = %error,
            "failed to listen for shutdown signal"
        );
    }
}
