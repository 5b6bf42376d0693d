mod bootstrap;
mod health;
mod sweeper;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use pidloga_core::config::{AppConfig, LoadOptions, LogFormat};
use pidloga_core::SystemClock;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing_subscriber::EnvFilter;

fn init_logging(config: &AppConfig) {
    // RUST_LOG wins over the configured level when set.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.as_str()));
    let builder = tracing_subscriber::fmt().with_target(false).with_env_filter(filter);

    match config.logging.format {
        LogFormat::Compact => builder.compact().init(),
        LogFormat::Pretty => builder.pretty().init(),
        LogFormat::Json => builder.json().init(),
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

    health::spawn(
        &app.config.server.bind_address,
        app.config.server.health_check_port,
        app.db_pool.clone(),
        app.sessions.clone(),
    )
    .await?;

    let sweeper = sweeper::spawn(
        app.sessions.clone(),
        Arc::new(SystemClock),
        app.config.conversation.session_ttl_secs,
    );

    tracing::info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        notify_chat_configured = app.config.telegram.notify_chat_id.is_some(),
        "pidloga-server started, polling for updates"
    );

    let grace = Duration::from_secs(app.config.server.graceful_shutdown_secs);
    let runner = app.runner;
    let (stop, stopped) = oneshot::channel::<()>();
    let mut polling = tokio::spawn(async move {
        runner
            .run_until(async {
                let _ = stopped.await;
            })
            .await
    });

    tokio::select! {
        finished = &mut polling => {
            stop_sweeper(sweeper);
            finished??;
            tracing::info!(event_name = "system.server.stopped", "update source closed");
            return Ok(());
        }
        signal = tokio::signal::ctrl_c() => signal?,
    }

    tracing::info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        grace_secs = grace.as_secs(),
        "shutdown requested, finishing dispatched chat work"
    );
    stop_sweeper(sweeper);
    let _ = stop.send(());

    match tokio::time::timeout(grace, &mut polling).await {
        Ok(finished) => finished??,
        Err(_) => {
            polling.abort();
            tracing::warn!(
                event_name = "system.server.shutdown_timeout",
                correlation_id = "shutdown",
                "chat workers did not finish within the grace period"
            );
        }
    }
    app.db_pool.close().await;

    Ok(())
}

fn stop_sweeper(sweeper: Option<JoinHandle<()>>) {
    if let Some(sweeper) = sweeper {
        sweeper.abort();
    }
}
