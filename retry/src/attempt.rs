//! Per-attempt records handed to attempt hooks and kept in error history.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// How a single attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    /// The operation returned a value.
    Success,
    /// The operation failed with a retryable error.
    TransientError,
    /// The operation failed with a non-retryable error.
    FatalError,
}

/// Record of a single attempt.
#[derive(Debug, Clone, Serialize)]
pub struct RetryAttempt {
    /// The attempt number (1-indexed).
    pub attempt_number: u32,
    /// Total attempts allowed by the policy.
    pub max_attempts: u32,
    /// Wall-clock time the attempt started.
    pub started_at: DateTime<Utc>,
    /// How long the attempt ran.
    pub elapsed: Duration,
    /// How the attempt ended.
    pub outcome: AttemptOutcome,
    /// Delay slept before the next attempt, `None` if there is no next attempt.
    pub delay_before_next: Option<Duration>,
    /// Display form of the error, if the attempt failed.
    pub error: Option<String>,
}

impl RetryAttempt {
    /// Returns `true` if another attempt follows this one.
    #[must_use]
    pub const fn will_retry(&self) -> bool {
        self.delay_before_next.is_some()
    }

    /// Short human-readable status, e.g. `retry 3/5 in 4s`.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::Duration;
    /// use chrono::Utc;
    /// use tradeflow_retry::{AttemptOutcome, RetryAttempt};
    ///
    /// let attempt = RetryAttempt {
    ///     attempt_number: 2,
    ///     max_attempts: 5,
    ///     started_at: Utc::now(),
    ///     elapsed: Duration::from_millis(120),
    ///     outcome: AttemptOutcome::TransientError,
    ///     delay_before_next: Some(Duration::from_secs(4)),
    ///     error: Some("rate limited".into()),
    /// };
    /// assert_eq!(attempt.summary(), "retry 3/5 in 4s");
    /// ```
    #[must_use]
    pub fn summary(&self) -> String {
        match (self.outcome, self.delay_before_next) {
            (AttemptOutcome::Success, _) => {
                format!("attempt {}/{} succeeded", self.attempt_number, self.max_attempts)
            }
            (AttemptOutcome::TransientError, Some(delay)) => format!(
                "retry {}/{} in {}",
                self.attempt_number + 1,
                self.max_attempts,
                format_delay(delay)
            ),
            (AttemptOutcome::TransientError, None) => {
                format!("attempt {}/{} failed, no retries left", self.attempt_number, self.max_attempts)
            }
            (AttemptOutcome::FatalError, _) => {
                format!("attempt {}/{} failed permanently", self.attempt_number, self.max_attempts)
            }
        }
    }
}

fn format_delay(delay: Duration) -> String {
    if delay.subsec_millis() == 0 {
        format!("{}s", delay.as_secs())
    } else {
        format!("{:.1}s", delay.as_secs_f64())
    }
}
