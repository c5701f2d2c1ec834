#![allow(dead_code)]

pub use streamvisor_test_utils::builders;
pub use streamvisor_test_utils::script_launcher;
pub use streamvisor_test_utils::{drain_events, init_tracing, wait_for_event, with_timeout};

#[cfg(unix)]
pub use streamvisor_test_utils::pid_alive;

use std::sync::Arc;
use std::time::Duration;

use streamvisor::runner::{Launcher, RunnerOptions, RunnerState, StatusEvent};
use streamvisor::supervisor::Supervisor;
use tokio::sync::broadcast;

/// Generous upper bound for a single lifecycle step in tests.
pub const STEP: Duration = Duration::from_secs(5);

pub fn supervisor(launcher: impl Launcher + 'static, options: RunnerOptions) -> Supervisor {
    Supervisor::new(builders::destination(), options, Arc::new(launcher))
}

/// Wait until the job `id` reports `Running`; returns its pid.
pub async fn wait_running(rx: &mut broadcast::Receiver<StatusEvent>, id: &str) -> u32 {
    let event = wait_for_event(rx, STEP, |e| {
        e.id.as_str() == id && e.state == RunnerState::Running
    })
    .await;
    event.pid.expect("running event carries a pid")
}
