// src/runner/process.rs

//! The per-job supervision loop.
//!
//! One call to [`supervise`] runs inside its own Tokio task for the whole life
//! of a runner: spawn, watch the child, back off and respawn on exit, and
//! finally terminate the child when a stop request arrives.

use std::process::ExitStatus;
use std::time::{Duration, SystemTime};

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Child;
use tokio::sync::{broadcast, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, warn};

use crate::errors::StreamvisorError;
use crate::job::Job;
use crate::source::Identifier;

use super::backoff::RestartTracker;
use super::command::CommandSpec;
use super::state::{RunnerState, StatusEvent};
use super::RunnerOptions;

/// How long to wait for the output readers to drain after the child exits.
const OUTPUT_DRAIN_GRACE: Duration = Duration::from_millis(200);

/// Everything a runner task needs, moved into the task at start.
pub(crate) struct RunnerContext {
    pub job: Job,
    pub command: CommandSpec,
    pub options: RunnerOptions,
    pub state_tx: watch::Sender<RunnerState>,
    pub events: broadcast::Sender<StatusEvent>,
}

impl RunnerContext {
    fn id(&self) -> &Identifier {
        &self.job.id
    }

    /// Record a transition: update the snapshot, broadcast it, log it.
    fn publish(&self, state: RunnerState, pid: Option<u32>, detail: Option<String>) {
        let at = SystemTime::now();
        match &state {
            RunnerState::Errored(_) => {
                error!(job = %self.job.id, state = %state, detail = ?detail, "runner state changed")
            }
            RunnerState::Backoff { .. } => {
                warn!(job = %self.job.id, state = %state, detail = ?detail, "runner state changed")
            }
            _ => info!(job = %self.job.id, state = %state, pid = ?pid, "runner state changed"),
        }

        self.state_tx.send_replace(state.clone());

        // No subscribers is fine; the snapshot above is the source of truth.
        let _ = self.events.send(StatusEvent {
            id: self.job.id.clone(),
            state,
            pid,
            detail,
            at,
        });
    }
}

/// Why the running phase ended.
enum RunEnd {
    Exited(std::io::Result<ExitStatus>),
    StopRequested(Duration),
}

/// Run the supervision loop until the job is stopped or errors out.
///
/// Returns `true` if the final stop had to force-kill the subprocess.
///
/// A dropped stop sender (the `Runner` handle went away without calling
/// `stop`) is treated as a stop request with the default timeout.
pub(crate) async fn supervise(
    ctx: RunnerContext,
    gate: Option<oneshot::Receiver<()>>,
    mut stop_rx: oneshot::Receiver<Duration>,
) -> bool {
    let mut tracker = RestartTracker::new(ctx.options.backoff.clone());
    let default_timeout = ctx.options.stop_timeout;

    if let Some(gate) = gate {
        ctx.publish(RunnerState::Starting, None, Some("waiting for predecessor".to_string()));
        tokio::select! {
            _ = gate => {}
            _ = &mut stop_rx => {
                ctx.publish(RunnerState::Stopping, None, None);
                ctx.publish(RunnerState::Stopped, None, None);
                return false;
            }
        }
    }

    loop {
        ctx.publish(RunnerState::Starting, None, None);
        debug!(job = %ctx.id(), cmd = %ctx.command, "spawning transcoder");

        let mut child = match ctx.command.to_command().spawn() {
            Ok(child) => child,
            Err(source) => {
                let err = StreamvisorError::Spawn {
                    id: ctx.id().to_string(),
                    source,
                };
                ctx.publish(RunnerState::Errored(err.to_string()), None, Some(err.to_string()));
                return false;
            }
        };

        let pid = child.id();
        ctx.publish(RunnerState::Running, pid, None);
        let stderr_tail = attach_output_readers(ctx.id(), &mut child);

        let stable = sleep(tracker.policy().stability_threshold);
        tokio::pin!(stable);
        let mut stable_reached = false;

        let end = loop {
            tokio::select! {
                status = child.wait() => break RunEnd::Exited(status),
                req = &mut stop_rx => break RunEnd::StopRequested(req.unwrap_or(default_timeout)),
                _ = &mut stable, if !stable_reached => {
                    stable_reached = true;
                    if tracker.attempt() > 0 {
                        info!(
                            job = %ctx.id(),
                            attempts = tracker.attempt(),
                            "transcoder stable; resetting restart counter"
                        );
                    }
                    tracker.mark_stable();
                }
            }
        };

        let status = match end {
            RunEnd::StopRequested(stop_timeout) => {
                return stop_child(&ctx, child, stop_timeout).await;
            }
            RunEnd::Exited(status) => status,
        };

        let tail = match timeout(OUTPUT_DRAIN_GRACE, stderr_tail).await {
            Ok(Ok(tail)) => tail,
            _ => None,
        };

        let status_text = match &status {
            Ok(s) => describe_exit(s),
            Err(e) => format!("wait failed: {e}"),
        };
        let clean_exit = matches!(&status, Ok(s) if s.success());

        if clean_exit && !ctx.options.loop_forever {
            info!(job = %ctx.id(), "transcoder finished its input");
            ctx.publish(RunnerState::Stopped, None, Some("input finished".to_string()));
            return false;
        }

        let err = StreamvisorError::RuntimeExit {
            id: ctx.id().to_string(),
            status: status_text,
            detail: tail,
        };

        let Some((attempt, delay)) = tracker.next_delay() else {
            let reason = format!("gave up after {} restarts; last failure: {err}", tracker.attempt());
            ctx.publish(RunnerState::Errored(reason), None, Some(err.to_string()));
            return false;
        };

        ctx.publish(
            RunnerState::Backoff {
                attempt,
                next_retry_at: SystemTime::now() + delay,
            },
            None,
            Some(err.to_string()),
        );

        tokio::select! {
            _ = sleep(delay) => {}
            _ = &mut stop_rx => {
                // Nothing is running during backoff; stopping is immediate.
                ctx.publish(RunnerState::Stopping, None, None);
                ctx.publish(RunnerState::Stopped, None, None);
                return false;
            }
        }
    }
}

/// Ask the child to exit, wait up to `stop_timeout`, then kill it.
async fn stop_child(ctx: &RunnerContext, mut child: Child, stop_timeout: Duration) -> bool {
    let pid = child.id();
    ctx.publish(RunnerState::Stopping, pid, None);
    request_termination(ctx.id(), &mut child);

    let forced = match timeout(stop_timeout, child.wait()).await {
        Ok(Ok(status)) => {
            debug!(job = %ctx.id(), status = %describe_exit(&status), "transcoder exited after termination request");
            false
        }
        Ok(Err(e)) => {
            warn!(job = %ctx.id(), error = %e, "waiting for transcoder failed; killing");
            force_kill(ctx.id(), &mut child).await;
            false
        }
        Err(_) => {
            warn!(
                job = %ctx.id(),
                timeout = ?stop_timeout,
                "transcoder ignored termination request; killing"
            );
            force_kill(ctx.id(), &mut child).await;
            true
        }
    };

    let detail = forced.then(|| {
        StreamvisorError::ShutdownTimeout {
            id: ctx.id().to_string(),
            timeout: stop_timeout,
        }
        .to_string()
    });
    ctx.publish(RunnerState::Stopped, None, detail);
    forced
}

/// Send SIGTERM to the child's process group (Unix) or kill it outright
/// elsewhere.
fn request_termination(id: &Identifier, child: &mut Child) {
    #[cfg(unix)]
    {
        use nix::sys::signal::{killpg, Signal};
        use nix::unistd::Pid;

        if let Some(pid) = child.id() {
            if let Err(e) = killpg(Pid::from_raw(pid as i32), Signal::SIGTERM) {
                debug!(job = %id, pid, error = %e, "SIGTERM delivery failed");
            }
        }
    }

    #[cfg(not(unix))]
    if let Err(e) = child.start_kill() {
        debug!(job = %id, error = %e, "termination request failed");
    }
}

/// SIGKILL the whole process group, then reap the child.
async fn force_kill(id: &Identifier, child: &mut Child) {
    #[cfg(unix)]
    {
        use nix::sys::signal::{killpg, Signal};
        use nix::unistd::Pid;

        if let Some(pid) = child.id() {
            let _ = killpg(Pid::from_raw(pid as i32), Signal::SIGKILL);
        }
    }

    if let Err(e) = child.kill().await {
        warn!(job = %id, error = %e, "failed to kill transcoder");
    }
}

fn describe_exit(status: &ExitStatus) -> String {
    if let Some(code) = status.code() {
        return format!("exit code {code}");
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(sig) = status.signal() {
            return format!("killed by signal {sig}");
        }
    }

    "unknown exit status".to_string()
}

/// Consume stdout/stderr so pipe buffers never fill; log lines at debug.
///
/// Returns a handle resolving to the last non-empty stderr line, which is
/// usually the transcoder's own explanation of why it quit.
fn attach_output_readers(id: &Identifier, child: &mut Child) -> JoinHandle<Option<String>> {
    if let Some(stdout) = child.stdout.take() {
        let id = id.clone();
        tokio::spawn(async move {
            forward_lines(stdout, &id, "stdout").await;
        });
    }

    let stderr = child.stderr.take();
    let id = id.clone();
    tokio::spawn(async move {
        match stderr {
            Some(stderr) => forward_lines(stderr, &id, "stderr").await,
            None => None,
        }
    })
}

/// Log every line of `reader`; returns the last non-empty one.
async fn forward_lines<R>(reader: R, id: &Identifier, stream: &'static str) -> Option<String>
where
    R: AsyncRead + Unpin,
{
    let mut last = None;
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        debug!(job = %id, "{}: {}", stream, line);
        let trimmed = line.trim();
        if !trimmed.is_empty() {
            last = Some(trimmed.to_string());
        }
    }
    last
}
