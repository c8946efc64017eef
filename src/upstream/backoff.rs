//! Reconnect policy and backoff calculation.
//!
//! - [`ReconnectPolicy`]: delay parameters (initial, growth, ceiling, jitter)
//! - [`Backoff`]: per-link attempt counter that produces the next delay
//!
//! Retries are never capped by count; the relay keeps trying for as
//! long as the process runs. The delay itself never exceeds
//! `max_delay_ms`.

use rand::Rng;
use serde::Deserialize;
use std::time::Duration;

/// Default delay before the first reconnect attempt in milliseconds.
pub const DEFAULT_INITIAL_DELAY_MS: u64 = 1000;
/// Default ceiling for any single delay in milliseconds.
pub const DEFAULT_MAX_DELAY_MS: u64 = 30_000;
/// Default growth factor between attempts.
pub const DEFAULT_MULTIPLIER: f64 = 2.0;
/// Default jitter factor (0.0–1.0).
pub const DEFAULT_JITTER_FACTOR: f64 = 0.2;
/// Lower bound for any delay in milliseconds, whatever the policy says.
pub const MIN_DELAY_MS: u64 = 10;

/// How long to wait between broker connection attempts.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ReconnectPolicy {
    /// Delay before the first retry in ms (default: 1000).
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    /// Upper bound for any delay in ms (default: 30000).
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Growth factor per failed attempt; 1.0 gives a fixed delay (default: 2.0).
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
    /// Jitter factor 0.0–1.0 (default: 0.2).
    #[serde(default = "default_jitter_factor")]
    pub jitter_factor: f64,
}

fn default_initial_delay_ms() -> u64 {
    DEFAULT_INITIAL_DELAY_MS
}
fn default_max_delay_ms() -> u64 {
    DEFAULT_MAX_DELAY_MS
}
fn default_multiplier() -> f64 {
    DEFAULT_MULTIPLIER
}
fn default_jitter_factor() -> f64 {
    DEFAULT_JITTER_FACTOR
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial_delay_ms: DEFAULT_INITIAL_DELAY_MS,
            max_delay_ms: DEFAULT_MAX_DELAY_MS,
            multiplier: DEFAULT_MULTIPLIER,
            jitter_factor: DEFAULT_JITTER_FACTOR,
        }
    }
}

impl ReconnectPolicy {
    /// Constant delay between attempts, no growth and no jitter
    pub fn fixed(delay: Duration) -> Self {
        let ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        Self {
            initial_delay_ms: ms,
            max_delay_ms: ms,
            multiplier: 1.0,
            jitter_factor: 0.0,
        }
    }

    /// Start a fresh attempt counter
    pub fn backoff(&self) -> Backoff {
        Backoff {
            policy: self.clone(),
            attempt: 0,
        }
    }

    /// Delay for the zero-based `attempt`, given `random` in `[0.0, 1.0)`.
    ///
    /// Formula: `min(max, initial * multiplier^attempt)`, then varied by
    /// `±jitter_factor` and clamped into `[MIN_DELAY_MS, max]`. A zero
    /// initial or max delay still waits [`MIN_DELAY_MS`] between attempts.
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    pub fn delay_for_attempt(&self, attempt: u32, random: f64) -> Duration {
        let floor = MIN_DELAY_MS as f64;
        let max = (self.max_delay_ms as f64).max(floor);
        let multiplier = if self.multiplier.is_finite() {
            self.multiplier.max(1.0)
        } else {
            1.0
        };
        let jitter = self.jitter_factor.clamp(0.0, 1.0);
        let random = random.clamp(0.0, 1.0);

        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let base = (self.initial_delay_ms as f64 * multiplier.powi(exponent)).min(max);

        // Symmetric: random 0.5 means no change
        let with_jitter = base * (1.0 + jitter * (2.0 * random - 1.0));

        Duration::from_millis(with_jitter.clamp(floor, max).round() as u64)
    }
}

/// Attempt counter for one broker link.
///
/// Call [`Backoff::next_delay`] after each failure and
/// [`Backoff::reset`] once a subscription succeeds.
#[derive(Debug, Clone)]
pub struct Backoff {
    policy: ReconnectPolicy,
    attempt: u32,
}

impl Backoff {
    /// Delay to wait before the next attempt; advances the counter
    pub fn next_delay(&mut self) -> Duration {
        let random = rand::thread_rng().gen::<f64>();
        let delay = self.policy.delay_for_attempt(self.attempt, random);
        self.attempt = self.attempt.saturating_add(1);
        delay
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    /// Failed attempts since the last reset
    pub fn attempt(&self) -> u32 {
        self.attempt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(initial: u64, max: u64, multiplier: f64, jitter: f64) -> ReconnectPolicy {
        ReconnectPolicy {
            initial_delay_ms: initial,
            max_delay_ms: max,
            multiplier,
            jitter_factor: jitter,
        }
    }

    #[test]
    fn test_default_policy() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.initial_delay_ms, 1000);
        assert_eq!(policy.max_delay_ms, 30_000);
        assert_eq!(policy.multiplier, 2.0);
        assert_eq!(policy.jitter_factor, 0.2);
    }

    #[test]
    fn test_exponential_growth_without_jitter() {
        let policy = policy(100, 10_000, 2.0, 0.0);
        let delays: Vec<u64> = (0..5)
            .map(|attempt| policy.delay_for_attempt(attempt, 0.5).as_millis() as u64)
            .collect();
        assert_eq!(delays, vec![100, 200, 400, 800, 1600]);
    }

    #[test]
    fn test_delay_never_exceeds_ceiling() {
        let policy = policy(1000, 5000, 3.0, 1.0);
        for attempt in [0, 1, 2, 10, 100, u32::MAX] {
            for random in [0.0, 0.25, 0.5, 0.999] {
                assert!(policy.delay_for_attempt(attempt, random) <= Duration::from_millis(5000));
            }
        }
    }

    #[test]
    fn test_jitter_range() {
        let policy = policy(1000, 60_000, 2.0, 0.2);
        assert_eq!(policy.delay_for_attempt(0, 0.0), Duration::from_millis(800));
        assert_eq!(policy.delay_for_attempt(0, 0.5), Duration::from_millis(1000));
        assert_eq!(policy.delay_for_attempt(0, 1.0), Duration::from_millis(1200));
    }

    #[test]
    fn test_fixed_delay() {
        let policy = ReconnectPolicy::fixed(Duration::from_secs(5));
        let mut backoff = policy.backoff();
        for _ in 0..10 {
            assert_eq!(backoff.next_delay(), Duration::from_secs(5));
        }
    }

    #[test]
    fn test_multiplier_below_one_does_not_shrink() {
        let policy = policy(1000, 10_000, 0.5, 0.0);
        assert_eq!(policy.delay_for_attempt(3, 0.5), Duration::from_millis(1000));
    }

    #[test]
    fn test_backoff_reset() {
        let mut backoff = policy(100, 10_000, 2.0, 0.0).backoff();
        assert_eq!(backoff.next_delay(), Duration::from_millis(100));
        assert_eq!(backoff.next_delay(), Duration::from_millis(200));
        assert_eq!(backoff.attempt(), 2);

        backoff.reset();
        assert_eq!(backoff.attempt(), 0);
        assert_eq!(backoff.next_delay(), Duration::from_millis(100));
    }

    #[test]
    fn test_zero_delays_are_floored() {
        let floor = Duration::from_millis(MIN_DELAY_MS);
        for policy in [policy(0, 0, 2.0, 0.5), policy(0, 30_000, 2.0, 0.0), policy(1000, 0, 2.0, 0.0)] {
            for attempt in [0, 1, 5] {
                for random in [0.0, 0.5, 0.999] {
                    assert!(policy.delay_for_attempt(attempt, random) >= floor);
                }
            }
        }
        assert_eq!(ReconnectPolicy::fixed(Duration::ZERO).backoff().next_delay(), floor);
    }

    #[test]
    fn test_deserialize_partial() {
        let policy: ReconnectPolicy = toml::from_str("initial_delay_ms = 5000").unwrap();
        assert_eq!(policy.initial_delay_ms, 5000);
        assert_eq!(policy.max_delay_ms, DEFAULT_MAX_DELAY_MS);
    }
}
