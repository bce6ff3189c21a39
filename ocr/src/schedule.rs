//! Poll intervals and time budgets.

use std::time::Duration;

/// Interval between status queries, tightening early and relaxing later.
///
/// Queries 1 and 2 follow the fast interval (short documents often finish
/// within a second), queries 3 to 5 the base interval, and later queries
/// twice the base interval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollSchedule {
    fast_interval: Duration,
    base_interval: Duration,
}

/// Queries that use the fast interval.
const FAST_POLLS: u32 = 2;
/// Last query that uses the base interval.
const BASE_POLLS: u32 = 5;

impl Default for PollSchedule {
    fn default() -> Self {
        Self {
            fast_interval: Duration::from_millis(500),
            base_interval: Duration::from_secs(1),
        }
    }
}

impl PollSchedule {
    /// A schedule with the given fast and base intervals.
    #[must_use]
    pub const fn new(fast_interval: Duration, base_interval: Duration) -> Self {
        Self {
            fast_interval,
            base_interval,
        }
    }

    /// Wait after status query `poll_number` (1-based) before the next one.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::Duration;
    /// use tradeflow_ocr::PollSchedule;
    ///
    /// let schedule = PollSchedule::default();
    /// assert_eq!(schedule.interval_after(1), Duration::from_millis(500));
    /// assert_eq!(schedule.interval_after(4), Duration::from_secs(1));
    /// assert_eq!(schedule.interval_after(9), Duration::from_secs(2));
    /// ```
    #[must_use]
    pub fn interval_after(&self, poll_number: u32) -> Duration {
        match poll_number {
            0..=FAST_POLLS => self.fast_interval,
            n if n <= BASE_POLLS => self.base_interval,
            _ => self.base_interval.saturating_mul(2),
        }
    }
}

/// Total time a document may spend in polling.
///
/// `base + pages * per_page`, scaled down for documents flagged as high
/// quality scans.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeoutBudget {
    base: Duration,
    per_page: Duration,
    high_quality_factor: f64,
}

impl Default for TimeoutBudget {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(30),
            per_page: Duration::from_secs(5),
            high_quality_factor: 0.75,
        }
    }
}

impl TimeoutBudget {
    /// A budget of `base + pages * per_page`.
    #[must_use]
    pub const fn new(base: Duration, per_page: Duration) -> Self {
        Self {
            base,
            per_page,
            high_quality_factor: 0.75,
        }
    }

    /// Sets the multiplier applied to high-quality documents, clamped to `(0, 1]`.
    #[must_use]
    pub fn with_high_quality_factor(mut self, factor: f64) -> Self {
        self.high_quality_factor = if factor.is_finite() && factor > 0.0 {
            factor.min(1.0)
        } else {
            1.0
        };
        self
    }

    /// The time budget for a document.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::Duration;
    /// use tradeflow_ocr::TimeoutBudget;
    ///
    /// let budget = TimeoutBudget::new(Duration::from_secs(10), Duration::from_secs(2));
    /// assert_eq!(budget.for_document(5, false), Duration::from_secs(20));
    /// assert_eq!(budget.for_document(5, true), Duration::from_secs(15));
    /// ```
    #[must_use]
    pub fn for_document(&self, pages_estimate: u32, high_quality: bool) -> Duration {
        let budget = self
            .base
            .saturating_add(self.per_page.saturating_mul(pages_estimate));
        if high_quality {
            budget.mul_f64(self.high_quality_factor)
        } else {
            budget
        }
    }
}
