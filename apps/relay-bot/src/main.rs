//! Link relay bot entry point.

mod api;
mod app;
mod config;
mod conversation;

use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting link relay bot");

    let config = config::BotConfig::from_env()?;
    tracing::info!(
        download_dir = %config.download_dir.display(),
        max_upload_bytes = config.max_upload_bytes,
        "configuration loaded"
    );

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(app::run(config))?;

    tracing::info!("bot shut down cleanly");
    Ok(())
}
