//! The adaptive status poll loop.

use std::time::Duration;

use tokio::time::Instant;
use tradeflow_retry::{ProgressReporter, Retry, RetryConfigCache, RetryPolicy};

use crate::client::OcrService;
use crate::schedule::PollSchedule;
use crate::types::{OperationStatus, PollOperation, TextLine};

/// How polling an operation ended.
#[derive(Debug, Clone)]
pub enum PollOutcome {
    /// The operation finished with results.
    Succeeded {
        /// Recognised lines.
        lines: Vec<TextLine>,
        /// Final operation state.
        operation: PollOperation,
    },
    /// The service reported failure.
    Failed {
        /// Final operation state.
        operation: PollOperation,
    },
    /// The budget elapsed with the operation still pending.
    TimedOut {
        /// Final operation state; its status is `NotStarted` or `Running`.
        operation: PollOperation,
        /// The budget that ran out.
        budget: Duration,
    },
    /// A status query failed after its retries.
    Errored {
        /// Final operation state.
        operation: PollOperation,
        /// Display form of the query error.
        error: String,
    },
}

impl PollOutcome {
    /// The operation state when polling stopped.
    #[must_use]
    pub const fn operation(&self) -> &PollOperation {
        match self {
            Self::Succeeded { operation, .. }
            | Self::Failed { operation }
            | Self::TimedOut { operation, .. }
            | Self::Errored { operation, .. } => operation,
        }
    }
}

/// Polls an operation on a [`PollSchedule`] until it finishes or its budget runs out.
///
/// Every status query runs under the retry controller, so a dropped
/// connection or a 429 costs a backoff rather than the whole document.
#[derive(Debug, Clone, Default)]
pub struct AdaptivePoller {
    schedule: PollSchedule,
    query_policy: Option<RetryPolicy>,
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn budget_percent(elapsed: Duration, budget: Duration) -> u8 {
    if budget.is_zero() {
        return 90;
    }
    let fraction = (elapsed.as_secs_f64() / budget.as_secs_f64()).clamp(0.0, 1.0);
    // polling spans 10% (submitted) to 90% (about to convert results)
    let scaled = 80.0f64.mul_add(fraction, 10.0).round();
    u8::try_from(scaled as u32).unwrap_or(90)
}

impl AdaptivePoller {
    /// A poller on `schedule`, retrying queries under the admin policy.
    #[must_use]
    pub const fn new(schedule: PollSchedule) -> Self {
        Self {
            schedule,
            query_policy: None,
        }
    }

    /// Retries each status query under `policy`.
    #[must_use]
    pub fn with_query_policy(mut self, policy: RetryPolicy) -> Self {
        self.query_policy = Some(policy);
        self
    }

    /// The interval schedule.
    #[must_use]
    pub const fn schedule(&self) -> &PollSchedule {
        &self.schedule
    }

    /// Polls `operation` until it leaves `NotStarted`/`Running` or `budget` elapses.
    ///
    /// The timeout is only reported once `budget` has fully elapsed since
    /// `operation.started_at`; the last sleep is shortened so a final query
    /// lands exactly on the deadline.
    pub async fn run(
        &self,
        service: &dyn OcrService,
        mut operation: PollOperation,
        budget: Duration,
        progress: &ProgressReporter,
    ) -> PollOutcome {
        let deadline = operation.started_at + budget;

        loop {
            operation.poll_count += 1;
            let policy = self
                .query_policy
                .clone()
                .unwrap_or_else(|| RetryConfigCache::global().policy());
            let query = Retry::new(policy)
                .label("ocr poll")
                .run(|| service.poll(&operation.operation_id));
            // retries of a single query must not outlive the budget
            let bounded = tokio::time::timeout_at(deadline, query).await;
            let Ok(queried) = bounded else {
                return timed_out(operation, budget);
            };

            let response = match queried {
                Ok(response) => response,
                Err(e) => {
                    tracing::warn!(poll = operation.poll_count, error = %e, "OCR status query failed");
                    return PollOutcome::Errored {
                        error: e.to_string(),
                        operation,
                    };
                }
            };

            operation.status = response.status;
            let elapsed = operation.started_at.elapsed();
            tracing::debug!(
                poll = operation.poll_count,
                status = %operation.status,
                elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
                "OCR poll"
            );

            match operation.status {
                OperationStatus::Succeeded => {
                    return PollOutcome::Succeeded {
                        lines: response.lines,
                        operation,
                    }
                }
                OperationStatus::Failed => return PollOutcome::Failed { operation },
                OperationStatus::NotStarted | OperationStatus::Running => {}
            }

            let now = Instant::now();
            if now >= deadline {
                return timed_out(operation, budget);
            }

            progress.report(
                "ocr",
                format!("OCR {} (poll {})", operation.status, operation.poll_count),
                budget_percent(elapsed, budget),
            );

            let wake = (now + self.schedule.interval_after(operation.poll_count)).min(deadline);
            tokio::time::sleep_until(wake).await;
        }
    }
}

fn timed_out(operation: PollOperation, budget: Duration) -> PollOutcome {
    tracing::warn!(
        polls = operation.poll_count,
        budget_secs = budget.as_secs_f64(),
        status = %operation.status,
        "OCR poll budget exhausted"
    );
    PollOutcome::TimedOut { operation, budget }
}
