// src/runner/mod.rs

//! Process runners.
//!
//! A [`Runner`] owns the lifecycle of exactly one transcoder subprocess for
//! one job. It is a thin handle around a Tokio task running
//! [`process::supervise`]; the task owns the `Child`, the handle owns the
//! task.
//!
//! - [`state`] holds the runner state machine types and status events.
//! - [`backoff`] computes restart delays.
//! - [`command`] turns a job into an argv via the [`Launcher`] trait.
//! - [`process`] is the supervision loop itself.

pub mod backoff;
pub mod command;
pub mod process;
pub mod state;

use std::time::Duration;

use anyhow::anyhow;
use tokio::sync::{broadcast, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::errors::{Result, StreamvisorError};
use crate::job::Job;
use crate::source::Identifier;

pub use backoff::{BackoffPolicy, RestartTracker};
pub use command::{CommandSpec, FfmpegLauncher, Launcher, TranscoderSettings};
pub use state::{RunnerState, StatusEvent};

use process::{supervise, RunnerContext};

/// Extra time granted on top of the stop timeout for the kill itself before
/// the runner task is aborted outright.
pub const KILL_GRACE: Duration = Duration::from_secs(2);

/// Per-runner policy (`[runner]` + `transcoder.loop_forever` in the config).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerOptions {
    /// Loop the input forever; any exit is then a failure.
    pub loop_forever: bool,
    pub backoff: BackoffPolicy,
    /// Graceful stop timeout used when the handle is dropped without `stop`.
    pub stop_timeout: Duration,
}

impl Default for RunnerOptions {
    fn default() -> Self {
        Self {
            loop_forever: true,
            backoff: BackoffPolicy::default(),
            stop_timeout: Duration::from_secs(5),
        }
    }
}

/// Handle to one supervised job.
///
/// Dropping the handle without calling [`Runner::stop`] still stops the
/// subprocess (with the default timeout) in the background.
#[derive(Debug)]
pub struct Runner {
    job: Job,
    state_rx: watch::Receiver<RunnerState>,
    stop_tx: Option<oneshot::Sender<Duration>>,
    handle: JoinHandle<bool>,
}

impl Runner {
    /// Start supervising `job`. Returns immediately; the spawn happens on the
    /// runner's own task. Must be called from within a Tokio runtime.
    pub fn start(
        job: Job,
        launcher: &dyn Launcher,
        options: RunnerOptions,
        events: broadcast::Sender<StatusEvent>,
    ) -> Self {
        Self::start_after(job, launcher, options, events, None)
    }

    /// Like [`Runner::start`], but the first spawn waits until `gate`
    /// resolves (or its sender is dropped). Used to hand a destination over
    /// from a predecessor that is still stopping.
    pub fn start_after(
        job: Job,
        launcher: &dyn Launcher,
        options: RunnerOptions,
        events: broadcast::Sender<StatusEvent>,
        gate: Option<oneshot::Receiver<()>>,
    ) -> Self {
        let command = launcher.command_for(&job, options.loop_forever);
        let (state_tx, state_rx) = watch::channel(RunnerState::Starting);
        let (stop_tx, stop_rx) = oneshot::channel();

        let ctx = RunnerContext {
            job: job.clone(),
            command,
            options,
            state_tx,
            events,
        };
        let handle = tokio::spawn(supervise(ctx, gate, stop_rx));

        Self {
            job,
            state_rx,
            stop_tx: Some(stop_tx),
            handle,
        }
    }

    pub fn id(&self) -> &Identifier {
        &self.job.id
    }

    pub fn job(&self) -> &Job {
        &self.job
    }

    /// Snapshot of the current state.
    pub fn status(&self) -> RunnerState {
        self.state_rx.borrow().clone()
    }

    /// Stop the runner: terminate the subprocess, wait up to `timeout`, then
    /// kill it.
    ///
    /// Fails with [`StreamvisorError::ShutdownTimeout`] when the subprocess
    /// had to be killed. The call itself is bounded by `timeout` plus
    /// [`KILL_GRACE`]; past that the runner task is aborted, which drops the
    /// child handle and kills it.
    pub async fn stop(mut self, timeout: Duration) -> Result<()> {
        if let Some(tx) = self.stop_tx.take() {
            if tx.send(timeout).is_err() {
                debug!(job = %self.job.id, "runner already finished before stop");
            }
        }

        match tokio::time::timeout(timeout + KILL_GRACE, &mut self.handle).await {
            Ok(Ok(false)) => Ok(()),
            Ok(Ok(true)) => Err(StreamvisorError::ShutdownTimeout {
                id: self.job.id.to_string(),
                timeout,
            }),
            Ok(Err(join_err)) => Err(StreamvisorError::Other(anyhow!(
                "runner task for job '{}' failed: {join_err}",
                self.job.id
            ))),
            Err(_) => {
                warn!(job = %self.job.id, "runner did not finish stopping in time; aborting task");
                self.handle.abort();
                Err(StreamvisorError::ShutdownTimeout {
                    id: self.job.id.to_string(),
                    timeout,
                })
            }
        }
    }
}
