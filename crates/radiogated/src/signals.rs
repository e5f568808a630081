//! Shutdown signal handling
//!
//! SIGINT and SIGTERM flip a watch channel; the poll loop races every tick
//! and every sleep against it.

use tokio::sync::watch;
use tracing::{info, warn};

/// Receiver flips to `true` once a shutdown signal arrives.
pub fn shutdown_channel() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);

    tokio::spawn(async move {
        wait_for_signal().await;
        let _ = tx.send(true);
    });

    rx
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(e) => {
            warn!("Failed to register SIGTERM handler: {}", e);
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Received SIGINT, shutting down");
            }
            return;
        }
    };

    tokio::select! {
        result = tokio::signal::ctrl_c() => match result {
            Ok(()) => info!("Received SIGINT, shutting down"),
            Err(e) => {
                warn!("Failed to listen for SIGINT: {}", e);
                sigterm.recv().await;
                info!("Received SIGTERM, shutting down");
            }
        },
        _ = sigterm.recv() => {
            info!("Received SIGTERM, shutting down");
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl-C, shutting down"),
        Err(e) => warn!("Failed to listen for Ctrl-C: {}", e),
    }
}
