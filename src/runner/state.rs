// src/runner/state.rs

use std::fmt;
use std::time::SystemTime;

use crate::source::Identifier;

/// Lifecycle state of one runner.
///
/// Owned by the runner task; everybody else only sees snapshots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunnerState {
    /// About to spawn (first start or after a backoff).
    Starting,
    /// Subprocess is alive.
    Running,
    /// Subprocess died; the next start is scheduled for `next_retry_at`.
    Backoff {
        attempt: u32,
        next_retry_at: SystemTime,
    },
    /// Termination requested, waiting for the subprocess to go away.
    Stopping,
    /// No subprocess; the runner is finished.
    Stopped,
    /// The job cannot run (spawn failure, restart cap reached). Not retried.
    Errored(String),
}

impl RunnerState {
    /// True once the runner task has nothing left to do.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunnerState::Stopped | RunnerState::Errored(_))
    }

    pub fn label(&self) -> &'static str {
        match self {
            RunnerState::Starting => "starting",
            RunnerState::Running => "running",
            RunnerState::Backoff { .. } => "backoff",
            RunnerState::Stopping => "stopping",
            RunnerState::Stopped => "stopped",
            RunnerState::Errored(_) => "errored",
        }
    }
}

impl fmt::Display for RunnerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunnerState::Backoff { attempt, .. } => write!(f, "backoff (attempt {attempt})"),
            RunnerState::Errored(reason) => write!(f, "errored: {reason}"),
            other => f.write_str(other.label()),
        }
    }
}

/// One state transition, as broadcast to status subscribers.
#[derive(Debug, Clone)]
pub struct StatusEvent {
    pub id: Identifier,
    pub state: RunnerState,
    /// OS pid of the subprocess, set on `Running`.
    pub pid: Option<u32>,
    /// Error text for failures (exit status, stderr tail, timeout).
    pub detail: Option<String>,
    pub at: SystemTime,
}
