// src/watch/mod.rs

//! Optional filesystem watcher for the source directory.
//!
//! Polling stays the source of truth. The watcher only sends a "rescan now"
//! nudge so additions and removals are picked up without waiting for the
//! next poll tick.

use std::path::PathBuf;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::errors::{Result, StreamvisorError};

/// Handle for the filesystem watcher.
///
/// Keeps the underlying `RecommendedWatcher` alive; dropping it stops
/// watching.
pub struct WatcherHandle {
    _inner: RecommendedWatcher,
}

impl std::fmt::Debug for WatcherHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatcherHandle").finish()
    }
}

/// Watch `dir` (non-recursively) and push a nudge into `nudge_tx` whenever
/// an entry is created, removed, renamed or modified.
///
/// `nudge_tx` should have a small capacity: a full channel means a rescan is
/// already pending, so bursts of events collapse into one nudge.
pub fn spawn_watcher(dir: impl Into<PathBuf>, nudge_tx: mpsc::Sender<()>) -> Result<WatcherHandle> {
    let dir = dir.into();

    // Closure called synchronously by notify whenever an event arrives.
    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| match res {
            Ok(event) => {
                if event.kind.is_access() {
                    return;
                }
                // Full: a rescan is already queued. Closed: daemon is gone.
                let _ = nudge_tx.try_send(());
            }
            Err(err) => warn!(error = %err, "directory watch error"),
        },
        Config::default(),
    )
    .map_err(watch_error)?;

    watcher
        .watch(&dir, RecursiveMode::NonRecursive)
        .map_err(watch_error)?;

    info!("directory watcher started on {:?}", dir);

    Ok(WatcherHandle { _inner: watcher })
}

fn watch_error(err: notify::Error) -> StreamvisorError {
    StreamvisorError::Other(anyhow::Error::new(err).context("starting directory watcher"))
}
