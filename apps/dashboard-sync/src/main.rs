//! Dashboard Sync Binary
//!
//! Connects the sync core to the real push endpoint and streams the
//! configured watchlist, logging state transitions and reconciled reads.
//!
//! # Usage
//!
//! ```bash
//! cargo run -p dashboard-sync
//! ```
//!
//! # Environment Variables
//!
//! ## Required
//! - `SESSION_ID`: session token for the push connection
//!
//! ## Optional
//! - `WS_BASE_URL`: push endpoint base (default: `ws://localhost:8000`)
//! - `SYNC_SYMBOLS`: comma-separated watchlist (default: dashboard majors)
//! - `SYNC_RECONNECT_DELAY_INITIAL_MS` / `SYNC_RECONNECT_DELAY_MAX_SECS` /
//!   `SYNC_RECONNECT_DELAY_MULTIPLIER` / `SYNC_MAX_RECONNECT_ATTEMPTS`
//! - `RUST_LOG`: log filter (default: info)

use std::sync::Arc;

use anyhow::Context;
use dashboard_sync::{StaticSession, SyncClient, SyncSettings, WsTransport};
use tokio::signal;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env is optional; real deployments set the environment directly.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings = SyncSettings::from_env().context("loading sync settings")?;
    tracing::info!(
        ws_base_url = %settings.ws_base_url,
        symbols = settings.symbols.len(),
        "starting dashboard sync"
    );

    let session = Arc::new(StaticSession::new(settings.session_id.clone()));
    let (client, handle) = SyncClient::new(
        settings.sync_config(),
        WsTransport::new(),
        Arc::clone(&session),
    );

    handle.subscribe(settings.symbols.clone());

    let runner = tokio::spawn(client.run());

    // Log the connectivity indicator as it changes.
    let mut state_rx = handle.state_changes();
    let state_logger = tokio::spawn(async move {
        while state_rx.changed().await.is_ok() {
            let state = *state_rx.borrow();
            tracing::info!(state = state.as_str(), "connectivity");
        }
    });

    signal::ctrl_c().await.context("waiting for ctrl-c")?;
    tracing::info!("shutting down");
    handle.shutdown();

    match runner.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::error!(error = %e, "sync client terminated"),
        Err(e) => tracing::error!(error = %e, "sync task panicked"),
    }
    state_logger.abort();

    if session.is_invalidated() {
        tracing::warn!("session was rejected by the server; log in again");
    }

    Ok(())
}
