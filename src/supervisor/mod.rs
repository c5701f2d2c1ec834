// src/supervisor/mod.rs

//! The supervisor owns every runner and is the only thing that mutates the
//! job set.
//!
//! Both entry points, [`Supervisor::reconcile`] and
//! [`Supervisor::shutdown_all`], hold the runner map lock for their
//! read-modify-write, so they serialize against each other. `reconcile`
//! never waits for a stop while holding it: removed runners are moved into a
//! drain set that stops them in the background, and `shutdown_all` waits for
//! that set as well as for the live runners.
//!
//! The timer/signal driven loop around it lives in [`daemon`].

pub mod daemon;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use tokio::sync::{broadcast, oneshot, Mutex};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::errors::{Result, StreamvisorError};
use crate::job::{plan_jobs, DestinationTemplate, Job};
use crate::runner::{Launcher, Runner, RunnerOptions, RunnerState, StatusEvent};
use crate::source::{Identifier, Source};

/// Capacity of the status broadcast; slow subscribers lag rather than block
/// runners.
const STATUS_CHANNEL_CAPACITY: usize = 256;

/// What one reconcile pass changed.
#[derive(Debug, Default)]
pub struct ReconcileReport {
    pub started: Vec<Identifier>,
    pub stopped: Vec<Identifier>,
    /// Same identifier, different source or destination: stopped then started.
    pub restarted: Vec<Identifier>,
    pub unchanged: usize,
    /// Sources skipped because no identifier could be derived.
    pub skipped: Vec<PathBuf>,
}

impl ReconcileReport {
    /// True if the pass did not start or stop anything.
    pub fn is_noop(&self) -> bool {
        self.started.is_empty() && self.stopped.is_empty() && self.restarted.is_empty()
    }
}

/// Outcome of [`Supervisor::shutdown_all`].
#[derive(Debug, Default)]
pub struct ShutdownReport {
    /// Runners owned at shutdown that stopped within the timeout.
    pub stopped: Vec<Identifier>,
    /// Failures of owned runners and of stops still pending from earlier
    /// reconcile passes.
    pub errors: Vec<StreamvisorError>,
}

impl ShutdownReport {
    /// Number of runners whose subprocess had to be killed.
    pub fn forced_kills(&self) -> usize {
        self.errors.iter().filter(|e| e.is_shutdown_timeout()).count()
    }

    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

type StopOutcome = (Identifier, Result<()>);

/// Owner of the job/runner set.
pub struct Supervisor {
    destination: DestinationTemplate,
    runner_options: RunnerOptions,
    launcher: Arc<dyn Launcher>,
    runners: Mutex<BTreeMap<Identifier, Runner>>,
    /// Stops handed off by `reconcile`. Only locked for non-blocking calls.
    draining: std::sync::Mutex<JoinSet<StopOutcome>>,
    events: broadcast::Sender<StatusEvent>,
}

impl std::fmt::Debug for Supervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Supervisor")
            .field("destination", &self.destination)
            .field("runner_options", &self.runner_options)
            .field("launcher", &self.launcher)
            .finish_non_exhaustive()
    }
}

impl Supervisor {
    pub fn new(
        destination: DestinationTemplate,
        runner_options: RunnerOptions,
        launcher: Arc<dyn Launcher>,
    ) -> Self {
        let (events, _) = broadcast::channel(STATUS_CHANNEL_CAPACITY);
        Self {
            destination,
            runner_options,
            launcher,
            runners: Mutex::new(BTreeMap::new()),
            draining: std::sync::Mutex::new(JoinSet::new()),
            events,
        }
    }

    /// Subscribe to every runner state transition from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<StatusEvent> {
        self.events.subscribe()
    }

    /// Snapshot of every owned runner's state.
    pub async fn statuses(&self) -> BTreeMap<Identifier, RunnerState> {
        let runners = self.runners.lock().await;
        runners
            .iter()
            .map(|(id, runner)| (id.clone(), runner.status()))
            .collect()
    }

    /// Jobs currently owned, keyed by identifier.
    pub async fn jobs(&self) -> BTreeMap<Identifier, Job> {
        let runners = self.runners.lock().await;
        runners
            .iter()
            .map(|(id, runner)| (id.clone(), runner.job().clone()))
            .collect()
    }

    /// Bring the runner set in line with `sources`.
    ///
    /// - The whole scan is validated first. Duplicate identifiers reject it
    ///   with [`StreamvisorError::DuplicateIdentifier`] and nothing changes.
    /// - Runners whose identifier disappeared (or whose job changed) are
    ///   removed and stopped in the background, each with the configured
    ///   stop timeout. The pass does not wait for them.
    /// - Runners for new identifiers are started right away. A changed job's
    ///   new runner waits for its predecessor to be gone before spawning, so
    ///   two processes never publish to the same destination.
    /// - Everything else is left alone, whatever its state.
    pub async fn reconcile(&self, sources: &[Source]) -> Result<ReconcileReport> {
        let plan = plan_jobs(sources, &self.destination)?;
        let mut desired = plan.jobs;

        // No await below this point: a cancelled pass never leaves a removed
        // runner untracked.
        let mut runners = self.runners.lock().await;
        let mut report = ReconcileReport {
            skipped: plan.skipped,
            ..ReconcileReport::default()
        };

        // Decide removals before touching anything.
        let mut to_stop = Vec::new();
        let mut changed = Vec::new();
        for (id, runner) in runners.iter() {
            match desired.get(id) {
                None => to_stop.push(id.clone()),
                Some(job) if job != runner.job() => changed.push(id.clone()),
                Some(_) => {
                    report.unchanged += 1;
                }
            }
        }

        let mut gates = BTreeMap::new();
        {
            let mut draining = self.lock_draining();
            // Outcomes were already logged by the stop tasks themselves.
            while draining.try_join_next().is_some() {}
            let stop_timeout = self.runner_options.stop_timeout;
            for id in to_stop.iter().chain(changed.iter()) {
                let Some(runner) = runners.remove(id) else {
                    continue;
                };
                let (done_tx, done_rx) = oneshot::channel();
                if changed.contains(id) {
                    gates.insert(id.clone(), done_rx);
                }
                draining.spawn(async move {
                    let id = runner.id().clone();
                    let result = runner.stop(stop_timeout).await;
                    if let Err(err) = &result {
                        warn!(job = %id, error = %err, "job did not stop cleanly");
                    }
                    let _ = done_tx.send(());
                    (id, result)
                });
            }
        }

        // Unchanged jobs keep their runners.
        desired.retain(|id, _| !runners.contains_key(id));

        for (id, job) in desired {
            debug!(job = %id, source = ?job.source, destination = %job.destination, "starting runner");
            let runner = Runner::start_after(
                job,
                self.launcher.as_ref(),
                self.runner_options.clone(),
                self.events.clone(),
                gates.remove(&id),
            );
            runners.insert(id.clone(), runner);
            if !changed.contains(&id) {
                report.started.push(id);
            }
        }

        report.stopped = to_stop;
        report.restarted = changed;

        if !report.is_noop() {
            info!(
                started = report.started.len(),
                stopped = report.stopped.len(),
                restarted = report.restarted.len(),
                unchanged = report.unchanged,
                "reconciled job set"
            );
        }

        Ok(report)
    }

    /// Stop every runner concurrently.
    ///
    /// Never fails fast: each runner gets `timeout` to exit after SIGTERM and
    /// is then killed, and the errors of all runners are collected in the
    /// report. Stops already handed off by earlier reconcile passes are
    /// awaited too (with the timeout they were started with). When this
    /// returns no subprocess owned by the supervisor is alive.
    pub async fn shutdown_all(&self, timeout: Duration) -> ShutdownReport {
        let mut runners = self.runners.lock().await;
        let all: Vec<Runner> = std::mem::take(&mut *runners).into_values().collect();
        let pending = std::mem::take(&mut *self.lock_draining());

        info!(
            count = all.len(),
            draining = pending.len(),
            timeout = ?timeout,
            "shutting down all runners"
        );
        // Drained ids were already reported by the pass that removed them.
        let ((stopped, mut errors), (_, drain_errors)) =
            tokio::join!(stop_concurrently(all, timeout), collect_stops(pending));
        errors.extend(drain_errors);

        for err in &errors {
            warn!(error = %err, "runner did not shut down cleanly");
        }

        ShutdownReport { stopped, errors }
    }

    fn lock_draining(&self) -> std::sync::MutexGuard<'_, JoinSet<StopOutcome>> {
        // The set stays consistent even if a holder panicked.
        self.draining
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

/// Stop runners in parallel; returns the cleanly stopped ids and the errors.
async fn stop_concurrently(
    runners: Vec<Runner>,
    timeout: Duration,
) -> (Vec<Identifier>, Vec<StreamvisorError>) {
    let mut set = JoinSet::new();
    for runner in runners {
        set.spawn(async move { (runner.id().clone(), runner.stop(timeout).await) });
    }
    collect_stops(set).await
}

/// Wait for every stop in `set`.
async fn collect_stops(mut set: JoinSet<StopOutcome>) -> (Vec<Identifier>, Vec<StreamvisorError>) {
    let mut stopped = Vec::new();
    let mut errors = Vec::new();
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((id, Ok(()))) => stopped.push(id),
            Ok((_, Err(err))) => errors.push(err),
            Err(join_err) => errors.push(StreamvisorError::Other(anyhow!(
                "stop task failed: {join_err}"
            ))),
        }
    }

    stopped.sort();
    (stopped, errors)
}
