pub mod builders;
pub mod script_launcher;

use std::time::Duration;

use tokio::sync::broadcast::{self, error::RecvError};
use tracing_subscriber::{fmt, EnvFilter};

use streamvisor::runner::StatusEvent;

/// Filter directive for test logs, e.g. `streamvisor::runner=trace`.
pub const TEST_LOG_ENV_VAR: &str = "STREAMVISOR_TEST_LOG";

/// Route `tracing` output through the test harness capture.
///
/// Every test calls this; only the first call in a binary installs the
/// subscriber. Runner child output is logged at debug, so
/// `STREAMVISOR_TEST_LOG=debug` shows what the scripts printed.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_env(TEST_LOG_ENV_VAR)
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .with_target(false)
        .try_init();
}

/// Run a future with a 10-second timeout.
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: std::future::Future<Output = T>,
{
    tokio::time::timeout(Duration::from_secs(10), f)
        .await
        .expect("Test timed out after 10 seconds")
}

/// Receive status events until one matches `pred`, returning it.
///
/// Panics if nothing matches within `limit` or the channel closes.
pub async fn wait_for_event<F>(
    rx: &mut broadcast::Receiver<StatusEvent>,
    limit: Duration,
    mut pred: F,
) -> StatusEvent
where
    F: FnMut(&StatusEvent) -> bool,
{
    let search = async {
        loop {
            match rx.recv().await {
                Ok(event) if pred(&event) => return event,
                Ok(_) => continue,
                Err(RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "test subscriber lagged");
                    continue;
                }
                Err(RecvError::Closed) => panic!("status channel closed while waiting"),
            }
        }
    };

    tokio::time::timeout(limit, search)
        .await
        .unwrap_or_else(|_| panic!("no matching status event within {limit:?}"))
}

/// Collect every event for `limit`, in arrival order.
pub async fn drain_events(
    rx: &mut broadcast::Receiver<StatusEvent>,
    limit: Duration,
) -> Vec<StatusEvent> {
    let mut events = Vec::new();
    let deadline = tokio::time::Instant::now() + limit;
    loop {
        match tokio::time::timeout_at(deadline, rx.recv()).await {
            Ok(Ok(event)) => events.push(event),
            Ok(Err(RecvError::Lagged(_))) => continue,
            Ok(Err(RecvError::Closed)) | Err(_) => return events,
        }
    }
}

/// True if a process with this pid still exists (zombies included).
#[cfg(unix)]
pub fn pid_alive(pid: u32) -> bool {
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    // No signal: existence and permission check only.
    kill(Pid::from_raw(pid as i32), None).is_ok()
}
