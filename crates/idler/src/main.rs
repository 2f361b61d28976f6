//! Jenkins Idler - scales idle Jenkins instances to zero
//!
//! Runs one idle controller per monitored user and idles or unidles the
//! user's Jenkins namespace depending on observed activity.

use anyhow::Result;
use idler_lib::{
    openshift::RestOpenShiftClient, toggles::FixedUuidToggle, IdlerMetrics, IdlerSupervisor,
};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod api;
mod config;

const IDLER_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!(version = IDLER_VERSION, component = "main", "Starting jenkins-idler");

    let config = config::Config::load()?;
    let problems = config.verify();
    if !problems.is_empty() {
        for problem in &problems {
            error!(component = "main", "{}", problem);
        }
        anyhow::bail!("invalid configuration ({} problems)", problems.len());
    }

    let idler_config = config.idler_config()?;
    info!(
        component = "main",
        openshift_api_url = %config.openshift_api_url,
        proxy_url = ?idler_config.proxy_url,
        max_retries = idler_config.max_retries,
        idle_after_minutes = config.idle_after_minutes,
        check_idle_minutes = config.check_idle_minutes,
        max_retries_quiet_interval_minutes = config.max_retries_quiet_interval_minutes,
        "Idler configured"
    );

    let features = FixedUuidToggle::new(config.fixed_uuids());
    if features.is_empty() {
        warn!(component = "main", "No user ids configured, idling is disabled for everyone");
    }

    let supervisor = Arc::new(IdlerSupervisor::new(
        config.openshift_api_url.clone(),
        config.openshift_token.clone(),
        idler_config,
        Arc::new(RestOpenShiftClient::new()?),
        Arc::new(features),
    )?);

    let metrics = IdlerMetrics::new();
    let app_state = Arc::new(api::AppState::new(supervisor.clone(), metrics));
    app_state.set_ready(true);

    let api_handle = tokio::spawn(api::serve(config.api_port, app_state));

    let shutdown = supervisor.shutdown_token();
    tokio::select! {
        res = tokio::signal::ctrl_c() => {
            res?;
            info!(component = "main", "SIGINT received");
        }
        _ = shutdown.cancelled() => {
            warn!(component = "main", "Idler cancelled");
        }
    }

    supervisor.shutdown().await;
    api_handle.abort();
    info!(component = "main", "Shutting down");

    Ok(())
}
