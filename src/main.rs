//! Service binary: builds the stack, runs the job worker and the session
//! sweeper until interrupted.

use anyhow::Result;
use lamprey::{Service, ServiceConfig};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn config_from_env() -> ServiceConfig {
    let mut config = ServiceConfig::default();
    if let Ok(root) = std::env::var("LAMPREY_STORAGE_ROOT") {
        config = config.with_storage_root(PathBuf::from(root));
    }
    if let Ok(threshold) = std::env::var("LAMPREY_SYNC_THRESHOLD_SECS") {
        if let Ok(secs) = threshold.parse::<f64>() {
            config = config.with_sync_threshold_secs(secs);
        }
    }
    if std::env::var("LAMPREY_HEADFUL").is_ok() {
        config = config.with_headless(false);
    }
    config
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = config_from_env();
    info!(storage_root = %config.storage_root().display(), "starting service");

    let service = Service::build(config).await?;
    let worker_shutdown = service.start_worker();

    info!(
        tools = service.registry.names().len(),
        "service ready; waiting for jobs"
    );

    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    worker_shutdown.store(true, std::sync::atomic::Ordering::Relaxed);
    service.shutdown().await;
    Ok(())
}
