//! Optional exponential-backoff layer over the call retry loop.
//!
//! The core retry loop (spec §4.1 step 8) retries sequentially with no
//! enforced delay between attempts. Callers that want spaced-out retries
//! attach a [`RetryPolicy`] to [`crate::config::ClientConfig`]; `RpcClient`
//! then sleeps [`ExponentialBackoff::next_delay`] between attempts instead of
//! retrying immediately.

use std::time::Duration;

pub mod defaults {
    use std::time::Duration;

    pub const BASE_DELAY: Duration = Duration::from_millis(100);
    pub const MULTIPLIER: f64 = 2.0;
    pub const JITTER: f64 = 0.2;
    pub const MAX_DELAY: Duration = Duration::from_secs(5);
}

#[derive(Clone, Debug)]
pub struct RetryPolicy {
    pub base_delay: Duration,
    pub multiplier: f64,
    pub jitter: f64,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            base_delay: defaults::BASE_DELAY,
            multiplier: defaults::MULTIPLIER,
            jitter: defaults::JITTER,
            max_delay: defaults::MAX_DELAY,
        }
    }
}

impl RetryPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn multiplier(mut self, multiplier: f64) -> Self {
        assert!(multiplier >= 1.0, "multiplier must be >= 1.0");
        self.multiplier = multiplier;
        self
    }

    pub fn jitter(mut self, jitter: f64) -> Self {
        assert!((0.0..=1.0).contains(&jitter), "jitter must be between 0.0 and 1.0");
        self.jitter = jitter;
        self
    }

    pub fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff::new(self.clone())
    }
}

/// Yields increasing delays: `base * multiplier^attempt`, jittered and
/// clamped to `max_delay`.
#[derive(Clone, Debug)]
pub struct ExponentialBackoff {
    policy: RetryPolicy,
    current_delay_secs: f64,
    attempts: u32,
}

impl ExponentialBackoff {
    fn new(policy: RetryPolicy) -> Self {
        let current_delay_secs = policy.base_delay.as_secs_f64();
        ExponentialBackoff {
            policy,
            current_delay_secs,
            attempts: 0,
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current_delay_secs;
        let jittered = if self.policy.jitter > 0.0 {
            let jitter_range = self.policy.jitter * 2.0;
            let random_factor = rand::random::<f64>() * jitter_range - self.policy.jitter;
            delay * (1.0 + random_factor)
        } else {
            delay
        };
        let clamped = jittered.min(self.policy.max_delay.as_secs_f64());

        self.current_delay_secs =
            (self.current_delay_secs * self.policy.multiplier).min(self.policy.max_delay.as_secs_f64());
        self.attempts += 1;

        Duration::from_secs_f64(clamped.max(0.0))
    }
}
