//! Exponential backoff

use std::time::Duration;

/// Largest exponent applied; keeps the multiplication finite
const MAX_EXPONENT: u32 = 20;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Extra random delay as a fraction of the computed delay (0.0 disables)
    pub jitter_factor: f64,
}

impl BackoffPolicy {
    pub fn new(base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            base_delay,
            max_delay,
            jitter_factor: 0.0,
        }
    }

    pub fn with_jitter(mut self, jitter_factor: f64) -> Self {
        self.jitter_factor = jitter_factor.clamp(0.0, 1.0);
        self
    }

    /// Delay before retry number `retry` (1-based): `base * 2^(retry-1)`, capped
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(MAX_EXPONENT);
        let delay = self.base_delay.saturating_mul(1u32 << exponent);

        let jittered = if self.jitter_factor > 0.0 {
            let jitter = fastrand::f64() * self.jitter_factor;
            delay.mul_f64(1.0 + jitter)
        } else {
            delay
        };

        jittered.min(self.max_delay)
    }
}
