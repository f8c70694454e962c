//! calendar-sync — binary entrypoint
//! Loads configuration, then syncs the financial calendar into the Webflow
//! collection at startup and every `SYNC_INTERVAL_SECS` until Ctrl+C.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;

use calendar_sync::api::{self, AppState};
use calendar_sync::cms::webflow::WebflowClient;
use calendar_sync::ingest::providers::oslo_bors::OsloBorsProvider;
use calendar_sync::ingest::scheduler::IntervalTicker;
use calendar_sync::metrics::Metrics;
use calendar_sync::{spawn_scheduler, SyncConfig, SyncJob, TracingObserver};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op when the variables come from the environment.
    let _ = dotenvy::dotenv();
    calendar_sync::init_tracing();

    let config = SyncConfig::from_env()?;
    tracing::info!(config = ?config, "starting calendar sync");

    let metrics = Metrics::init()?;
    let http = config.http_client()?;

    let job = SyncJob::new(
        Arc::new(OsloBorsProvider::from_config(&config, http.clone())),
        Arc::new(WebflowClient::new(&config, http)),
        Arc::new(TracingObserver),
    );

    let scheduler = spawn_scheduler(IntervalTicker::every(config.interval()), job.clone());
    tracing::info!(target: "scheduler", interval = ?config.interval(), "scheduler started");

    let server = match config.status_addr {
        Some(addr) => {
            let app = api::router(AppState { job }).merge(metrics.router());
            let listener = tokio::net::TcpListener::bind(addr)
                .await
                .with_context(|| format!("binding status server to {addr}"))?;
            tracing::info!(%addr, "status server listening");
            Some(tokio::spawn(async move {
                if let Err(e) = axum::serve(listener, app).await {
                    tracing::error!(error = ?e, "status server stopped");
                }
            }))
        }
        None => None,
    };

    signal::ctrl_c().await.context("waiting for Ctrl+C")?;
    tracing::info!("shutdown signal received, stopping");

    scheduler.abort();
    if let Some(server) = server {
        server.abort();
    }
    Ok(())
}
