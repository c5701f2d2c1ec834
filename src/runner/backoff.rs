// src/runner/backoff.rs

//! Restart delay policy.

use std::time::Duration;

/// Exponential backoff with a cap, plus the stability window after which a
/// running subprocess is considered healthy again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub initial: Duration,
    pub max: Duration,
    pub multiplier: u32,
    /// Continuous running time after which the attempt counter resets.
    pub stability_threshold: Duration,
    /// Give up (runner goes `Errored`) once this many consecutive restarts
    /// have been attempted. `None` retries forever.
    pub max_restarts: Option<u32>,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial: Duration::from_secs(1),
            max: Duration::from_secs(30),
            multiplier: 2,
            stability_threshold: Duration::from_secs(10),
            max_restarts: None,
        }
    }
}

impl BackoffPolicy {
    /// Delay before restart number `attempt` (1-based):
    /// `initial * multiplier^(attempt - 1)`, capped at `max`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        self.multiplier
            .checked_pow(exponent)
            .and_then(|factor| self.initial.checked_mul(factor))
            .map_or(self.max, |d| d.min(self.max))
    }
}

/// Consecutive-failure counter for one runner.
#[derive(Debug, Clone)]
pub struct RestartTracker {
    policy: BackoffPolicy,
    attempt: u32,
}

impl RestartTracker {
    pub fn new(policy: BackoffPolicy) -> Self {
        Self { policy, attempt: 0 }
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn policy(&self) -> &BackoffPolicy {
        &self.policy
    }

    /// Record a failure and return `(attempt, delay)` for the next restart,
    /// or `None` when the restart cap is exhausted.
    pub fn next_delay(&mut self) -> Option<(u32, Duration)> {
        let attempt = self.attempt.saturating_add(1);
        if self.policy.max_restarts.is_some_and(|max| attempt > max) {
            return None;
        }
        self.attempt = attempt;
        Some((attempt, self.policy.delay_for(attempt)))
    }

    /// The subprocess stayed up past the stability threshold.
    pub fn mark_stable(&mut self) {
        self.attempt = 0;
    }
}
