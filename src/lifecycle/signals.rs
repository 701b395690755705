//! OS signal handling.
//!
//! Ctrl-C and SIGTERM trigger graceful shutdown. SIGHUP reloads the
//! configuration file when one is in use and never shuts down.

use crate::config::ConfigWatcher;
use crate::lifecycle::Shutdown;

/// Wait for a terminating signal, handling reloads meanwhile, then trigger
/// shutdown.
pub async fn handle_signals(shutdown: Shutdown, reloader: Option<ConfigWatcher>) {
    wait_for_terminate(reloader.as_ref()).await;
    tracing::info!("Shutdown signal received");
    shutdown.trigger();
}

#[cfg(unix)]
async fn wait_for_terminate(reloader: Option<&ConfigWatcher>) {
    use tokio::signal::unix::{signal, SignalKind};

    let (mut terminate, mut hangup) = match (
        signal(SignalKind::terminate()),
        signal(SignalKind::hangup()),
    ) {
        (Ok(terminate), Ok(hangup)) => (terminate, hangup),
        (Err(e), _) | (_, Err(e)) => {
            tracing::warn!(error = %e, "Unix signal handlers unavailable, only Ctrl-C is handled");
            wait_for_ctrl_c().await;
            return;
        }
    };

    loop {
        tokio::select! {
            _ = wait_for_ctrl_c() => return,
            _ = terminate.recv() => return,
            _ = hangup.recv() => match reloader {
                Some(watcher) => {
                    tracing::info!("SIGHUP received, reloading configuration");
                    watcher.reload();
                }
                None => tracing::info!("SIGHUP ignored: no configuration file in use"),
            },
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_terminate(_reloader: Option<&ConfigWatcher>) {
    wait_for_ctrl_c().await;
}

async fn wait_for_ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}
