// src/signals.rs

//! OS shutdown signals.
//!
//! On unix SIGINT, SIGTERM and SIGQUIT all request a graceful shutdown;
//! elsewhere only Ctrl-C does.

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[cfg(unix)]
pub async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigquit = signal(SignalKind::quit())?;

    tokio::select! {
        _ = sigint.recv() => info!("received SIGINT"),
        _ = sigterm.recv() => info!("received SIGTERM"),
        _ = sigquit.recv() => info!("received SIGQUIT"),
    }
    Ok(())
}

#[cfg(not(unix))]
pub async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await?;
    info!("received Ctrl-C");
    Ok(())
}

/// Cancel `token` on the first shutdown signal.
///
/// If signal handlers cannot be installed the token is left alone and the
/// supervisor runs until its own cycle ends.
pub fn cancel_on_shutdown_signal(token: CancellationToken) {
    tokio::spawn(async move {
        tokio::select! {
            res = wait_for_shutdown_signal() => match res {
                Ok(()) => token.cancel(),
                Err(err) => warn!(error = %err, "failed to listen for shutdown signals"),
            },
            _ = token.cancelled() => {}
        }
    });
}
