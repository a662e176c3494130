//! Prospect signal service: binary entrypoint.
//! Boots the Axum HTTP server with the fetch/batch pipeline, session cache and
//! Prometheus metrics.

use std::sync::Arc;

use prospect_signals::config::{Credentials, PipelineConfig};
use prospect_signals::metrics::Metrics;
use prospect_signals::{create_router, AppState, BatchOrchestrator};
use shuttle_axum::ShuttleAxum;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Compact logs by default; JSON lines when `SIGNALS_LOG_JSON=1`.
fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("signals=info,warn"));
    let json = std::env::var("SIGNALS_LOG_JSON")
        .ok()
        .is_some_and(|v| v == "1");

    let registry = tracing_subscriber::registry().with(filter);
    // The shuttle runtime may already have installed a subscriber.
    let _ = if json {
        registry.with(fmt::layer().json()).try_init()
    } else {
        registry.with(fmt::layer().compact()).try_init()
    };
}

/// Running batches stop at their next entity boundary once the process is asked to stop.
async fn cancel_on_ctrl_c(shutdown: CancellationToken) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            info!(target: "signals::api", "shutdown signal received, cancelling batches");
            shutdown.cancel();
        }
        Err(e) => warn!(target: "signals::api", error = %e, "cannot listen for shutdown signal"),
    }
}

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    let config = PipelineConfig::load_default()?;
    let creds = Credentials::from_env();
    info!(target: "signals::config", ?creds, max_articles = config.max_articles, "pipeline configured");

    let pipeline = BatchOrchestrator::from_config(config, &creds).map_err(anyhow::Error::from)?;
    let metrics = Metrics::init()?;

    let shutdown = CancellationToken::new();
    tokio::spawn(cancel_on_ctrl_c(shutdown.clone()));

    let state = AppState::with_shutdown(Arc::new(pipeline), shutdown);
    let router = create_router(state).merge(metrics.router());
    Ok(router.into())
}
