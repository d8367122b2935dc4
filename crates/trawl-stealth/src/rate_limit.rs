//! Randomized, failure-scaled request pacing.

use rand::Rng;
use std::time::Duration;
use trawl_recipe::AntiDetectionConfig;

/// Failures beyond this stop doubling the delay.
const MAX_DOUBLINGS: u32 = 5;

/// Computes the wait before each page action.
///
/// `delay = uniform(min, max) * 2^failures`, capped at `max_backoff` but
/// never below `min`.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    min: f64,
    max: f64,
    cap: f64,
    consecutive_failures: u32,
}

impl RateLimiter {
    pub fn new(min: f64, max: f64, cap: f64) -> Self {
        Self {
            min,
            max: max.max(min),
            cap,
            consecutive_failures: 0,
        }
    }

    pub fn from_config(config: &AntiDetectionConfig) -> Self {
        Self::new(
            config.rate_limit_min_delay,
            config.rate_limit_max_delay,
            config.max_backoff,
        )
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Sample the next delay.
    pub fn next_delay<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        let base = if self.max > self.min {
            rng.gen_range(self.min..=self.max)
        } else {
            self.min
        };
        let factor = f64::from(1u32 << self.consecutive_failures.min(MAX_DOUBLINGS));
        let delay = (base * factor).min(self.cap).max(self.min);
        Duration::from_secs_f64(delay)
    }

    /// A step succeeded: move back toward the base delay.
    pub fn record_success(&mut self) {
        self.consecutive_failures = self.consecutive_failures.saturating_sub(1);
    }

    /// A step failed: double the next delay.
    pub fn record_failure(&mut self) {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
    }

    #[cfg(test)]
    pub(crate) fn set_failures(&mut self, failures: u32) {
        self.consecutive_failures = failures;
    }
}
