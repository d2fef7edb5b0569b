//! Exponential backoff used by the connection manager.

use std::time::Duration;

use rand::{Rng, SeedableRng, rngs::StdRng};

use super::config::BackoffPolicy;

/// Produces growing delays for one retry sequence.
pub struct Backoff {
    policy: BackoffPolicy,
    current: Duration,
    rng: StdRng,
}

impl Backoff {
    /// Start a new sequence at the policy's base delay.
    pub fn new(policy: BackoffPolicy) -> Self {
        Self {
            current: policy.base.min(policy.cap),
            rng: StdRng::from_entropy(),
            policy,
        }
    }

    /// Return the delay to sleep before the next attempt and grow the window.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        let grown = (self.current.as_nanos() as f64 * self.policy.multiplier).round();
        self.current = if grown.is_finite() && grown < self.policy.cap.as_nanos() as f64 {
            Duration::from_nanos(grown as u64)
        } else {
            self.policy.cap
        };

        if !self.policy.jitter {
            return delay;
        }
        let upper = u64::try_from(delay.as_nanos()).unwrap_or(u64::MAX);
        Duration::from_nanos(self.rng.gen_range(upper / 2..=upper))
    }
}
