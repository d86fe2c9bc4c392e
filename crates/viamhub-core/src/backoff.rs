// ── Reconnect backoff ──
//
// `delay = min(initial * 2^failures, max)`. No jitter: each manager
// talks to exactly one robot, so there is no reconnect storm to spread.

use std::time::Duration;

use tokio::time::Instant;

use crate::config::BackoffConfig;

/// Backoff window after `failures` consecutive failed attempts.
pub fn delay_for(failures: u32, config: &BackoffConfig) -> Duration {
    2u32.checked_pow(failures)
        .and_then(|factor| config.initial_delay.checked_mul(factor))
        .map_or(config.max_delay, |delay| delay.min(config.max_delay))
}

/// Book-keeping for the reconnect state machine.
#[derive(Debug, Clone)]
pub struct AttemptState {
    consecutive_failures: u32,
    next_backoff: Duration,
    last_attempt_at: Option<Instant>,
}

impl AttemptState {
    pub fn new(config: &BackoffConfig) -> Self {
        Self {
            consecutive_failures: 0,
            next_backoff: config.initial_delay,
            last_attempt_at: None,
        }
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn next_backoff(&self) -> Duration {
        self.next_backoff
    }

    pub fn last_attempt_at(&self) -> Option<Instant> {
        self.last_attempt_at
    }

    /// Time left before another connect may be attempted.
    pub fn remaining(&self, now: Instant) -> Duration {
        self.last_attempt_at.map_or(Duration::ZERO, |at| {
            self.next_backoff
                .saturating_sub(now.saturating_duration_since(at))
        })
    }

    pub fn in_backoff_window(&self, now: Instant) -> bool {
        !self.remaining(now).is_zero()
    }

    pub fn record_attempt(&mut self, now: Instant) {
        self.last_attempt_at = Some(now);
    }

    pub fn record_success(&mut self, config: &BackoffConfig) {
        self.consecutive_failures = 0;
        self.next_backoff = config.initial_delay;
    }

    pub fn record_failure(&mut self, config: &BackoffConfig) {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.next_backoff = delay_for(self.consecutive_failures, config);
    }
}
