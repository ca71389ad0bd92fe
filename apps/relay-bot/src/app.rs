//! Long-poll loop wiring the Bot API client to the transfer pipeline.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use linkrelay_fetch::{FetchClient, HttpSettings};
use linkrelay_pipeline::{TransferCoordinator, TransferEvent};
use linkrelay_telegram::{ApiEndpointConfig, BotClient};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::BotConfig;
use crate::conversation::Dispatcher;

/// How long one `getUpdates` call may hold the connection open.
const POLL_WAIT: Duration = Duration::from_secs(30);

/// Pause after a failed poll.
const POLL_BACKOFF: Duration = Duration::from_secs(5);

pub async fn run(config: BotConfig) -> anyhow::Result<()> {
    let endpoint = ApiEndpointConfig::load(&config.api_config_path)
        .with_context(|| format!("loading {}", config.api_config_path.display()))?;
    info!(
        endpoint = endpoint.endpoint(),
        local = endpoint.use_local_api,
        "Bot API endpoint selected"
    );

    let client = Arc::new(BotClient::new(&config.token, &endpoint)?);
    let me = client.get_me().await.context("token rejected by the Bot API")?;
    info!(bot = me.username.as_deref().unwrap_or(&me.first_name), "authenticated");

    let fetch = Arc::new(FetchClient::new(HttpSettings::default())?);
    let coordinator = Arc::new(TransferCoordinator::new(
        client.clone(),
        fetch,
        config.pipeline_settings(),
    ));
    if let Some(events) = coordinator.take_events().await {
        tokio::spawn(log_events(events));
    }

    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => info!("interrupt received, shutting down"),
                Err(e) => error!(error = %e, "cannot listen for interrupt"),
            }
            shutdown.cancel();
        });
    }

    let mut dispatcher = Dispatcher::new(client.clone(), Arc::clone(&coordinator));
    let mut offset = None;

    loop {
        let updates = tokio::select! {
            _ = shutdown.cancelled() => break,
            result = client.get_updates(offset, POLL_WAIT) => result,
        };

        match updates {
            Ok(updates) => {
                for update in &updates {
                    offset = Some(update.update_id + 1);
                    dispatcher.dispatch(update);
                }
            }
            Err(e) => {
                warn!(error = %e, "polling failed");
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = tokio::time::sleep(POLL_BACKOFF) => {}
                }
            }
        }
    }

    coordinator.cancel_all();
    dispatcher.shutdown().await;
    Ok(())
}

async fn log_events(mut events: mpsc::Receiver<TransferEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            TransferEvent::StateChanged { requester, state } => {
                debug!(requester = %requester, state = %state, "state changed");
            }
            TransferEvent::Completed { requester, size } => {
                info!(requester = %requester, size, "document delivered");
            }
            TransferEvent::Failed { requester, error } => {
                warn!(requester = %requester, error = %error, "transfer failed");
            }
        }
    }
}
