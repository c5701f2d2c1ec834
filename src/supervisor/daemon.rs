// src/supervisor/daemon.rs

//! The long-running loop around a [`Supervisor`]: initial scan, periodic
//! rescans (nudged early by the directory watcher) and a graceful
//! `shutdown_all` once the shutdown future resolves.

use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::errors::{Result, StreamvisorError};
use crate::source::{scan_with, SourceFilter};
use crate::supervisor::{ShutdownReport, Supervisor};
use crate::watch::spawn_watcher;

/// Bursts of directory events within this window collapse into one rescan.
const NUDGE_DEBOUNCE: Duration = Duration::from_millis(250);

#[derive(Debug, Clone)]
pub struct DaemonOptions {
    pub source_dir: PathBuf,
    pub filter: SourceFilter,
    pub poll_interval: Duration,
    /// Scan once at startup and never again.
    pub once: bool,
    /// Start a directory watcher for early rescans.
    pub watch: bool,
    pub stop_timeout: Duration,
}

/// Run the supervisor until `shutdown` resolves, then stop every job.
///
/// Only the initial scan is fatal: an unreadable source directory at
/// startup is returned as an error (after which nothing is running). Later
/// scan failures and rejected scans are logged and the current job set is
/// kept until the next tick.
pub async fn run_daemon<F>(
    supervisor: &Supervisor,
    options: &DaemonOptions,
    shutdown: F,
) -> Result<ShutdownReport>
where
    F: Future<Output = ()>,
{
    let initial = scan_with(&options.source_dir, &options.filter)?;
    info!(
        dir = ?options.source_dir,
        sources = initial.len(),
        "initial scan complete"
    );
    match supervisor.reconcile(&initial).await {
        Ok(report) => debug!(?report, "initial reconcile"),
        Err(err @ StreamvisorError::DuplicateIdentifier { .. }) => {
            error!(error = %err, "initial scan rejected; waiting for the next rescan");
        }
        Err(err) => return Err(err),
    }

    // The sender stays alive for the whole loop so `recv` never sees a
    // closed channel, even without a watcher.
    let (nudge_tx, mut nudge_rx) = mpsc::channel::<()>(1);
    let _watcher = if options.watch && !options.once {
        match spawn_watcher(&options.source_dir, nudge_tx.clone()) {
            Ok(handle) => Some(handle),
            Err(err) => {
                warn!(error = %err, "directory watcher unavailable; polling only");
                None
            }
        }
    } else {
        None
    };

    let mut ticker = tokio::time::interval(options.poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick fires immediately; the initial scan already covered it.
    ticker.tick().await;

    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("shutdown requested");
                break;
            }
            _ = ticker.tick(), if !options.once => {
                tokio::select! {
                    _ = &mut shutdown => {
                        info!("shutdown requested during rescan");
                        break;
                    }
                    _ = rescan(supervisor, options) => {}
                }
            }
            Some(()) = nudge_rx.recv(), if !options.once => {
                tokio::select! {
                    _ = &mut shutdown => {
                        info!("shutdown requested during rescan");
                        break;
                    }
                    _ = async {
                        tokio::time::sleep(NUDGE_DEBOUNCE).await;
                        while nudge_rx.try_recv().is_ok() {}
                        debug!("rescan nudged by directory watcher");
                        rescan(supervisor, options).await;
                    } => {
                        ticker.reset();
                    }
                }
            }
        }
    }

    drop(nudge_tx);
    Ok(supervisor.shutdown_all(options.stop_timeout).await)
}

/// One scan + reconcile cycle; failures leave the job set untouched.
async fn rescan(supervisor: &Supervisor, options: &DaemonOptions) {
    let sources = match scan_with(&options.source_dir, &options.filter) {
        Ok(sources) => sources,
        Err(err) => {
            warn!(error = %err, "scan failed; keeping current jobs");
            return;
        }
    };

    match supervisor.reconcile(&sources).await {
        Ok(report) => debug!(?report, "rescan complete"),
        Err(err) => error!(error = %err, "scan rejected; keeping current jobs"),
    }
}

/// Resolves on SIGINT (Ctrl-C) or, on unix, SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
