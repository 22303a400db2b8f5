//! Exponential backoff with optional jitter.

use std::time::Duration;

use rand::Rng;

use crate::config::RetryConfig;

/// Delay schedule between retry attempts: `base × multiplier^(attempt-1)`, capped.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExponentialBackoff {
    base: Duration,
    multiplier: f64,
    max: Duration,
    jitter_factor: f64,
}

impl ExponentialBackoff {
    pub fn new(base: Duration, multiplier: f64) -> Self {
        Self {
            base,
            multiplier,
            max: Duration::MAX,
            jitter_factor: 0.0,
        }
    }

    pub fn with_max(mut self, max: Duration) -> Self {
        self.max = max;
        self
    }

    pub fn with_jitter(mut self, jitter_factor: f64) -> Self {
        self.jitter_factor = jitter_factor.clamp(0.0, 1.0);
        self
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(config.base_delay(), config.multiplier)
            .with_max(config.max_delay())
            .with_jitter(config.jitter_factor)
    }

    /// Delay to wait after the given (1-based) failed attempt.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let exponent = i32::try_from(attempt - 1).unwrap_or(i32::MAX);
        let factor = self.multiplier.powi(exponent);
        let delay_secs = self.base.as_secs_f64() * factor;
        let capped = if delay_secs.is_finite() && delay_secs < self.max.as_secs_f64() {
            Duration::from_secs_f64(delay_secs)
        } else {
            self.max
        };

        // Jitter only ever adds, so the schedule keeps growing.
        let jitter_range = capped.as_secs_f64() * self.jitter_factor;
        if jitter_range > 0.0 {
            let jitter = rand::thread_rng().gen_range(0.0..jitter_range);
            capped.saturating_add(Duration::from_secs_f64(jitter))
        } else {
            capped
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_calculation() {
        let backoff = ExponentialBackoff::new(Duration::from_millis(1000), 2.0);
        assert_eq!(backoff.delay_after(0), Duration::ZERO);
        assert_eq!(backoff.delay_after(1), Duration::from_millis(1000));
        assert_eq!(backoff.delay_after(2), Duration::from_millis(2000));
        assert_eq!(backoff.delay_after(3), Duration::from_millis(4000));
    }

    #[test]
    fn test_backoff_is_capped() {
        let backoff = ExponentialBackoff::new(Duration::from_millis(100), 2.0)
            .with_max(Duration::from_millis(1000));
        assert_eq!(backoff.delay_after(10), Duration::from_millis(1000));
        assert_eq!(backoff.delay_after(u32::MAX), Duration::from_millis(1000));
    }

    #[test]
    fn test_jitter_stays_within_range() {
        let backoff = ExponentialBackoff::new(Duration::from_millis(1000), 2.0).with_jitter(0.1);
        for _ in 0..50 {
            let delay = backoff.delay_after(2);
            assert!(delay >= Duration::from_millis(2000));
            assert!(delay < Duration::from_millis(2200));
        }
    }
}
