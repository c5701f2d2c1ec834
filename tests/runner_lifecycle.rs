// tests/runner_lifecycle.rs

mod common;
use crate::common::builders::{job, RunnerOptionsBuilder};
use crate::common::script_launcher::{ScriptLauncher, FAIL_FAST, FINISH, RUN_FOREVER};
use crate::common::{
    drain_events, init_tracing, wait_for_event, wait_running, with_timeout, STEP,
};

use std::time::{Duration, SystemTime};

use tokio::sync::{broadcast, oneshot};

use streamvisor::runner::{Runner, RunnerState, StatusEvent};

fn channel() -> (broadcast::Sender<StatusEvent>, broadcast::Receiver<StatusEvent>) {
    broadcast::channel(256)
}

/// Delay announced by a Backoff event (retry time minus publish time).
fn announced_delay(event: &StatusEvent) -> Duration {
    match &event.state {
        RunnerState::Backoff { next_retry_at, .. } => next_retry_at
            .duration_since(event.at)
            .unwrap_or(Duration::ZERO),
        other => panic!("not a backoff event: {other:?}"),
    }
}

fn is_backoff(event: &StatusEvent) -> bool {
    matches!(event.state, RunnerState::Backoff { .. })
}

#[tokio::test]
async fn repeated_failures_back_off_with_growing_capped_delays() {
    init_tracing();
    let (tx, mut rx) = channel();
    let options = RunnerOptionsBuilder::new().backoff(50, 200).build();
    let runner = Runner::start(job("flaky.mp4"), &ScriptLauncher::new(FAIL_FAST), options, tx);

    let mut backoffs = Vec::new();
    while backoffs.len() < 5 {
        backoffs.push(wait_for_event(&mut rx, STEP, is_backoff).await);
    }

    let attempts: Vec<u32> = backoffs
        .iter()
        .map(|e| match e.state {
            RunnerState::Backoff { attempt, .. } => attempt,
            _ => unreachable!(),
        })
        .collect();
    assert_eq!(attempts, vec![1, 2, 3, 4, 5]);

    let expected_ms = [50u64, 100, 200, 200, 200];
    for (event, expected) in backoffs.iter().zip(expected_ms) {
        let delay = announced_delay(event);
        assert!(
            delay <= Duration::from_millis(expected)
                && delay + Duration::from_millis(30) >= Duration::from_millis(expected),
            "attempt delay {delay:?}, expected about {expected}ms"
        );
    }

    let detail = backoffs[0].detail.clone().unwrap_or_default();
    assert!(detail.contains("exit code 3"), "detail was {detail:?}");
    assert!(detail.contains("boom: no such stream"), "detail was {detail:?}");

    with_timeout(runner.stop(Duration::from_secs(1))).await.unwrap();
}

#[tokio::test]
async fn clean_exit_without_looping_means_the_input_is_done() {
    init_tracing();
    let (tx, mut rx) = channel();
    let options = RunnerOptionsBuilder::new().loop_forever(false).build();
    let runner = Runner::start(job("once.mp4"), &ScriptLauncher::new(FINISH), options, tx);

    let stopped = wait_for_event(&mut rx, STEP, |e| e.state.is_terminal()).await;

    assert_eq!(stopped.state, RunnerState::Stopped);
    assert_eq!(stopped.detail.as_deref(), Some("input finished"));
    assert_eq!(runner.status(), RunnerState::Stopped);
    with_timeout(runner.stop(Duration::from_secs(1))).await.unwrap();
}

#[tokio::test]
async fn clean_exit_while_looping_is_a_failure() {
    init_tracing();
    let (tx, mut rx) = channel();
    let options = RunnerOptionsBuilder::new().loop_forever(true).build();
    let runner = Runner::start(job("loop.mp4"), &ScriptLauncher::new(FINISH), options, tx);

    let event = wait_for_event(&mut rx, STEP, |e| is_backoff(e) || e.state.is_terminal()).await;

    assert!(is_backoff(&event), "got {:?}", event.state);
    assert!(event.detail.unwrap_or_default().contains("exit code 0"));
    with_timeout(runner.stop(Duration::from_secs(1))).await.unwrap();
}

#[tokio::test]
async fn restart_cap_turns_the_runner_errored() {
    init_tracing();
    let (tx, mut rx) = channel();
    let options = RunnerOptionsBuilder::new().backoff(10, 20).max_restarts(2).build();
    let runner = Runner::start(job("doomed.mp4"), &ScriptLauncher::new(FAIL_FAST), options, tx);

    let errored = wait_for_event(&mut rx, STEP, |e| e.state.is_terminal()).await;

    match &errored.state {
        RunnerState::Errored(reason) => assert!(reason.contains("gave up after 2 restarts")),
        other => panic!("expected Errored, got {other:?}"),
    }
    with_timeout(runner.stop(Duration::from_secs(1))).await.unwrap();
}

#[tokio::test]
async fn staying_up_past_the_threshold_resets_the_attempt_counter() {
    init_tracing();
    let scratch = tempfile::tempdir().unwrap();
    let counter = scratch.path().join("runs");
    // Runs 1-2 fail at once, run 3 stays up for 600ms and then fails,
    // later runs stay up.
    let script = format!(
        "n=$(cat '{c}' 2>/dev/null || echo 0); n=$((n+1)); echo $n > '{c}'; \
         if [ $n -le 2 ]; then exit 1; fi; \
         if [ $n -eq 3 ]; then sleep 0.6; exit 1; fi; \
         while :; do sleep 0.1; done",
        c = counter.display()
    );

    let (tx, mut rx) = channel();
    let options = RunnerOptionsBuilder::new()
        .backoff(20, 100)
        .stability_threshold(Duration::from_millis(300))
        .build();
    let runner = Runner::start(job("recovers.mp4"), &ScriptLauncher::new(&script), options, tx);

    let mut attempts = Vec::new();
    while attempts.len() < 3 {
        let event = wait_for_event(&mut rx, STEP, is_backoff).await;
        if let RunnerState::Backoff { attempt, .. } = event.state {
            attempts.push(attempt);
        }
    }

    assert_eq!(attempts, vec![1, 2, 1]);

    wait_running(&mut rx, "recovers").await;
    with_timeout(runner.stop(Duration::from_secs(1))).await.unwrap();
}

#[tokio::test]
async fn stop_during_backoff_is_immediate() {
    init_tracing();
    let (tx, mut rx) = channel();
    let options = RunnerOptionsBuilder::new().backoff(5_000, 10_000).build();
    let runner = Runner::start(job("slow.mp4"), &ScriptLauncher::new(FAIL_FAST), options, tx);

    wait_for_event(&mut rx, STEP, is_backoff).await;

    let started = SystemTime::now();
    with_timeout(runner.stop(Duration::from_secs(1))).await.unwrap();
    let elapsed = started.elapsed().unwrap_or_default();

    assert!(elapsed < Duration::from_secs(1), "stop took {elapsed:?}");
    let last = wait_for_event(&mut rx, STEP, |e| e.state.is_terminal()).await;
    assert_eq!(last.state, RunnerState::Stopped);
}

#[tokio::test]
async fn stopping_a_running_job_terminates_it_gracefully() {
    init_tracing();
    let (tx, mut rx) = channel();
    let runner = Runner::start(
        job("steady.mp4"),
        &ScriptLauncher::new(RUN_FOREVER),
        RunnerOptionsBuilder::new().build(),
        tx,
    );

    let pid = wait_running(&mut rx, "steady").await;
    assert_eq!(runner.status(), RunnerState::Running);

    with_timeout(runner.stop(Duration::from_secs(1))).await.unwrap();

    let stopped = wait_for_event(&mut rx, STEP, |e| e.state.is_terminal()).await;
    assert_eq!(stopped.state, RunnerState::Stopped);
    assert!(stopped.detail.is_none());
    #[cfg(unix)]
    assert!(!crate::common::pid_alive(pid));
    #[cfg(not(unix))]
    let _ = pid;
}

#[tokio::test]
async fn gated_runner_spawns_only_after_the_gate_opens() {
    init_tracing();
    let (tx, mut rx) = channel();
    let (open_tx, open_rx) = oneshot::channel();
    let runner = Runner::start_after(
        job("handover.mp4"),
        &ScriptLauncher::new(RUN_FOREVER),
        RunnerOptionsBuilder::new().build(),
        tx,
        Some(open_rx),
    );

    let waiting = drain_events(&mut rx, Duration::from_millis(300)).await;
    assert!(waiting.iter().all(|e| e.pid.is_none()));
    assert!(waiting.iter().all(|e| e.state == RunnerState::Starting));
    assert_eq!(runner.status(), RunnerState::Starting);

    open_tx.send(()).unwrap();
    wait_running(&mut rx, "handover").await;

    with_timeout(runner.stop(Duration::from_secs(1))).await.unwrap();
}

#[tokio::test]
async fn stopping_a_gated_runner_never_spawns() {
    init_tracing();
    let (tx, mut rx) = channel();
    let (_open_tx, open_rx) = oneshot::channel::<()>();
    let runner = Runner::start_after(
        job("never.mp4"),
        &ScriptLauncher::new(RUN_FOREVER),
        RunnerOptionsBuilder::new().build(),
        tx,
        Some(open_rx),
    );

    with_timeout(runner.stop(Duration::from_secs(1))).await.unwrap();

    let events = drain_events(&mut rx, Duration::from_millis(100)).await;
    assert!(events.iter().all(|e| e.pid.is_none()));
    assert_eq!(events.last().map(|e| e.state.clone()), Some(RunnerState::Stopped));
}
