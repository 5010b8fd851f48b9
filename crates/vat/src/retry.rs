//! Retry/backoff as an explicit state machine.
//!
//! `Attempting(n)` moves to `Succeeded` on a terminal outcome, to
//! `Retrying { delay }` on a retryable one while attempts remain, and to
//! `GaveUp` once the budget is spent. `resume` leaves `Retrying` for the next
//! `Attempting`. No clock is involved: callers sleep on the returned delay.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;

/// Cap on the exponent so the delay arithmetic cannot overflow.
const MAX_BACKOFF_EXPONENT: u32 = 16;

/// Source of jitter samples in `[-1.0, 1.0]`.
pub trait JitterSource: Send + Sync {
    fn sample(&self) -> f64;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct RandomJitter;

impl JitterSource for RandomJitter {
    fn sample(&self) -> f64 {
        rand::thread_rng().gen_range(-1.0..=1.0)
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct FixedJitter(pub f64);

impl JitterSource for FixedJitter {
    fn sample(&self) -> f64 {
        self.0.clamp(-1.0, 1.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub jitter_pct: u8,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self { max_attempts: 3, base_delay: Duration::from_millis(500), jitter_pct: 20 }
    }
}

impl BackoffPolicy {
    /// Delay after the `failed_attempt`-th attempt: `base * 2^(n-1)` scaled by
    /// `1 + jitter_pct/100 * sample`.
    pub fn delay_after(&self, failed_attempt: u32, sample: f64) -> Duration {
        let exponent = failed_attempt.saturating_sub(1).min(MAX_BACKOFF_EXPONENT);
        let nominal = self.base_delay.as_millis() as f64 * f64::from(1u32 << exponent);
        let spread = f64::from(self.jitter_pct) / 100.0 * sample.clamp(-1.0, 1.0);
        let millis = (nominal * (1.0 + spread)).max(0.0).round();
        Duration::from_millis(millis as u64)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AttemptOutcome {
    Terminal,
    Retryable,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RetryState {
    Attempting(u32),
    Retrying { next_attempt: u32, delay: Duration },
    Succeeded { attempts: u32 },
    GaveUp { attempts: u32 },
}

impl RetryState {
    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Succeeded { .. } | Self::GaveUp { .. })
    }
}

pub struct RetrySchedule {
    policy: BackoffPolicy,
    jitter: Arc<dyn JitterSource>,
    state: RetryState,
}

impl RetrySchedule {
    pub fn new(policy: BackoffPolicy, jitter: Arc<dyn JitterSource>) -> Self {
        let policy = BackoffPolicy { max_attempts: policy.max_attempts.max(1), ..policy };
        Self { policy, jitter, state: RetryState::Attempting(1) }
    }

    pub fn state(&self) -> RetryState {
        self.state
    }

    /// Number of the attempt in flight, or of the last one made.
    pub fn attempt(&self) -> u32 {
        match self.state {
            RetryState::Attempting(n) => n,
            RetryState::Retrying { next_attempt, .. } => next_attempt - 1,
            RetryState::Succeeded { attempts } | RetryState::GaveUp { attempts } => attempts,
        }
    }

    /// Records the outcome of the current attempt. Ignored outside `Attempting`.
    pub fn on_outcome(&mut self, outcome: AttemptOutcome) -> RetryState {
        let RetryState::Attempting(attempt) = self.state else {
            return self.state;
        };

        self.state = match outcome {
            AttemptOutcome::Terminal => RetryState::Succeeded { attempts: attempt },
            AttemptOutcome::Retryable if attempt < self.policy.max_attempts => {
                RetryState::Retrying {
                    next_attempt: attempt + 1,
                    delay: self.policy.delay_after(attempt, self.jitter.sample()),
                }
            }
            AttemptOutcome::Retryable => RetryState::GaveUp { attempts: attempt },
        };
        self.state
    }

    /// Leaves `Retrying` for the next attempt. Ignored in any other state.
    pub fn resume(&mut self) -> RetryState {
        if let RetryState::Retrying { next_attempt, .. } = self.state {
            self.state = RetryState::Attempting(next_attempt);
        }
        self.state
    }
}
