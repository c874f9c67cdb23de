// src/watch/relay.rs

//! Turns raw watch notifications into debounced restart signals.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::errors::{DevloopError, Result};
use crate::watch::watcher::WatchEvent;

/// Default quiet window after a change before another restart may be emitted.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(50);

/// Run the relay until the stream closes, fails, or `abort` is raised.
///
/// - The first change while idle emits one restart signal right away and
///   opens a quiet window of `debounce`.
/// - Changes during the window extend it and emit nothing.
/// - The restart channel has capacity 1; if a signal is already pending the
///   new one is dropped, so the relay never blocks on the supervisor.
/// - An error event raises `abort` and is returned as the terminal error.
/// - A cleanly closed stream ends the relay without raising `abort`.
pub async fn run_relay(
    mut events: mpsc::UnboundedReceiver<WatchEvent>,
    restart_tx: mpsc::Sender<()>,
    abort: CancellationToken,
    debounce: Duration,
) -> Result<()> {
    info!(?debounce, "watch relay started");

    // `Some(deadline)` while inside the quiet window.
    let mut quiet_until: Option<Instant> = None;

    loop {
        tokio::select! {
            _ = abort.cancelled() => {
                debug!("watch relay observed abort");
                return Ok(());
            }

            _ = sleep_until(quiet_until.unwrap_or_else(Instant::now)), if quiet_until.is_some() => {
                debug!("quiet window elapsed; relay idle");
                quiet_until = None;
            }

            event = events.recv() => match event {
                None => {
                    info!("watch event stream closed; relay finished");
                    return Ok(());
                }
                Some(WatchEvent::Error(reason)) => {
                    error!(%reason, "file watcher failed; aborting");
                    abort.cancel();
                    return Err(DevloopError::Watch(reason));
                }
                Some(WatchEvent::Changed(path)) => {
                    if quiet_until.is_none() {
                        info!(path = %path.display(), "change detected; requesting restart");
                        if restart_tx.try_send(()).is_err() {
                            debug!("restart already pending; coalescing");
                        }
                    } else {
                        debug!(path = %path.display(), "change within quiet window; coalescing");
                    }
                    quiet_until = Some(Instant::now() + debounce);
                }
            },
        }
    }
}
