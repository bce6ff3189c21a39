//! Retry policy and backoff computation.

use std::time::Duration;

use rand::Rng;

/// Lower bound for `max_retries`.
pub const MIN_RETRIES: u32 = 1;
/// Upper bound for `max_retries`, bounding worst-case latency.
pub const MAX_RETRIES: u32 = 10;
/// Attempts used when no configuration is available.
pub const DEFAULT_MAX_RETRIES: u32 = 3;
/// Base delay used when no configuration is available.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(2);
/// Ceiling for a single backoff delay.
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(60);

/// Relative spread of the jitter factor: delays are scaled by `1 ± JITTER_SPREAD`.
pub const JITTER_SPREAD: f64 = 0.25;

/// Clamps a configured attempt count into `[MIN_RETRIES, MAX_RETRIES]`.
///
/// # Examples
///
/// ```
/// use tradeflow_retry::policy::clamp_retries;
///
/// assert_eq!(clamp_retries(0), 1);
/// assert_eq!(clamp_retries(15), 10);
/// assert_eq!(clamp_retries(-4), 1);
/// assert_eq!(clamp_retries(5), 5);
/// ```
#[must_use]
pub fn clamp_retries(requested: i64) -> u32 {
    let clamped = requested.clamp(i64::from(MIN_RETRIES), i64::from(MAX_RETRIES));
    u32::try_from(clamped).unwrap_or(DEFAULT_MAX_RETRIES)
}

/// Converts configured seconds into a `Duration`, treating negative values as zero.
#[must_use]
pub fn seconds(value: f64, fallback: Duration) -> Duration {
    if value.is_finite() {
        Duration::try_from_secs_f64(value.max(0.0)).unwrap_or(fallback)
    } else {
        fallback
    }
}

/// How many times an operation is attempted and how long to wait in between.
///
/// `max_retries` counts total attempts (the first call included) and is always
/// within `[1, 10]`.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    max_retries: u32,
    base_delay: Duration,
    max_delay: Duration,
    jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// Creates a policy with the given attempt count (clamped) and base delay.
    #[must_use]
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self::default()
            .with_max_retries(max_retries)
            .with_base_delay(base_delay)
    }

    /// A policy that makes exactly one attempt.
    #[must_use]
    pub const fn single_attempt() -> Self {
        Self {
            max_retries: MIN_RETRIES,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            jitter: false,
        }
    }

    /// Sets the total number of attempts, clamped to `[1, 10]`.
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = clamp_retries(i64::from(max_retries));
        self
    }

    /// Sets the delay before the second attempt.
    #[must_use]
    pub const fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    /// Sets the ceiling for any single delay.
    #[must_use]
    pub const fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Enables or disables jitter.
    #[must_use]
    pub const fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Total attempts, the first call included.
    #[must_use]
    pub const fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Delay before the second attempt.
    #[must_use]
    pub const fn base_delay(&self) -> Duration {
        self.base_delay
    }

    /// Ceiling for any single delay.
    #[must_use]
    pub const fn max_delay(&self) -> Duration {
        self.max_delay
    }

    /// Whether delays are randomised.
    #[must_use]
    pub const fn jitter(&self) -> bool {
        self.jitter
    }

    /// Delay slept before attempt `attempt` (1-indexed), jitter included.
    ///
    /// Attempt 1 has no delay; attempt `n` waits
    /// `min(base_delay * 2^(n-2) * (1 ± jitter), max_delay)`.
    #[must_use]
    pub fn delay_before(&self, attempt: u32) -> Duration {
        let factor = if self.jitter {
            rand::thread_rng().gen_range(1.0 - JITTER_SPREAD..=1.0 + JITTER_SPREAD)
        } else {
            1.0
        };
        self.scaled_delay(attempt, factor)
    }

    /// Delay before attempt `attempt` without jitter.
    #[must_use]
    pub fn nominal_delay_before(&self, attempt: u32) -> Duration {
        self.scaled_delay(attempt, 1.0)
    }

    fn scaled_delay(&self, attempt: u32, factor: f64) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }
        // 2^62 keeps the product finite for any configured base delay
        let exponent = i32::try_from((attempt - 2).min(62)).unwrap_or(62);
        let raw = self.base_delay.as_secs_f64() * 2f64.powi(exponent) * factor;
        let capped = raw.min(self.max_delay.as_secs_f64());
        seconds(capped, self.max_delay)
    }
}
