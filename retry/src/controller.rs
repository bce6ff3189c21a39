//! The bounded retry loop.

use std::fmt::Display;
use std::future::Future;

use chrono::Utc;
use tokio::time::Instant;

use crate::attempt::{AttemptOutcome, RetryAttempt};
use crate::classify::Transience;
use crate::config::RetryConfigCache;
use crate::error::RetryError;
use crate::policy::RetryPolicy;

type Classifier<'a, E> = Box<dyn Fn(&E) -> bool + Send + Sync + 'a>;
type AttemptHook<'a> = Box<dyn FnMut(&RetryAttempt) + Send + 'a>;

/// Retry loop for a single operation.
///
/// Errors the classifier accepts are retried with exponential backoff until
/// the policy's attempt budget is spent; any other error ends the loop after
/// the attempt that produced it. The attempt hook runs synchronously after
/// every attempt, before the backoff sleep.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use tradeflow_retry::{Retry, RetryPolicy};
///
/// # async fn example() {
/// let policy = RetryPolicy::new(3, Duration::from_millis(10));
/// let value = Retry::with_classifier(policy, |e: &String| e.contains("429"))
///     .label("classify intent")
///     .on_attempt(|attempt| println!("{}", attempt.summary()))
///     .run(|| async { Ok::<_, String>(42) })
///     .await;
/// assert_eq!(value.ok(), Some(42));
/// # }
/// ```
pub struct Retry<'a, E> {
    policy: RetryPolicy,
    classify: Classifier<'a, E>,
    on_attempt: Option<AttemptHook<'a>>,
    label: &'a str,
}

impl<'a, E> Retry<'a, E>
where
    E: Transience + 'a,
{
    /// Creates a retry loop that classifies errors through [`Transience`].
    #[must_use]
    pub fn new(policy: RetryPolicy) -> Self {
        Self::with_classifier(policy, E::is_transient)
    }
}

impl<'a, E> Retry<'a, E> {
    /// Creates a retry loop with a custom transient-error predicate.
    #[must_use]
    pub fn with_classifier(
        policy: RetryPolicy,
        classify: impl Fn(&E) -> bool + Send + Sync + 'a,
    ) -> Self {
        Self {
            policy,
            classify: Box::new(classify),
            on_attempt: None,
            label: "operation",
        }
    }

    /// Replaces the transient-error predicate.
    #[must_use]
    pub fn classify(mut self, classify: impl Fn(&E) -> bool + Send + Sync + 'a) -> Self {
        self.classify = Box::new(classify);
        self
    }

    /// Registers a hook invoked after every attempt.
    #[must_use]
    pub fn on_attempt(mut self, hook: impl FnMut(&RetryAttempt) + Send + 'a) -> Self {
        self.on_attempt = Some(Box::new(hook));
        self
    }

    /// Names the operation in log events.
    #[must_use]
    pub const fn label(mut self, label: &'a str) -> Self {
        self.label = label;
        self
    }

    /// The policy this loop runs under.
    #[must_use]
    pub const fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    fn notify(&mut self, record: &RetryAttempt) {
        if let Some(hook) = self.on_attempt.as_mut() {
            hook(record);
        }
    }

    /// Runs `operation` until it succeeds, fails fatally, or the attempt budget is spent.
    ///
    /// # Errors
    ///
    /// Returns [`RetryError::Fatal`] on the first non-retryable error and
    /// [`RetryError::Exhausted`] with the last transient error once all
    /// attempts have failed.
    pub async fn run<T, F, Fut>(mut self, mut operation: F) -> Result<T, RetryError<E>>
    where
        E: Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let max_attempts = self.policy.max_retries();
        let mut history = Vec::new();
        let mut attempt_number = 0;

        loop {
            attempt_number += 1;
            let started_at = Utc::now();
            let clock = Instant::now();
            let result = operation().await;
            let elapsed = clock.elapsed();

            let error = match result {
                Ok(value) => {
                    let record = RetryAttempt {
                        attempt_number,
                        max_attempts,
                        started_at,
                        elapsed,
                        outcome: AttemptOutcome::Success,
                        delay_before_next: None,
                        error: None,
                    };
                    self.notify(&record);
                    if attempt_number > 1 {
                        tracing::info!(label = self.label, attempt_number, "succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(error) => error,
            };

            if !(self.classify)(&error) {
                let record = RetryAttempt {
                    attempt_number,
                    max_attempts,
                    started_at,
                    elapsed,
                    outcome: AttemptOutcome::FatalError,
                    delay_before_next: None,
                    error: Some(error.to_string()),
                };
                self.notify(&record);
                history.push(record);
                tracing::warn!(label = self.label, attempt_number, %error, "non-retryable failure");
                return Err(RetryError::Fatal {
                    attempt: attempt_number,
                    error,
                    history,
                });
            }

            let delay = (attempt_number < max_attempts)
                .then(|| self.policy.delay_before(attempt_number + 1));
            let record = RetryAttempt {
                attempt_number,
                max_attempts,
                started_at,
                elapsed,
                outcome: AttemptOutcome::TransientError,
                delay_before_next: delay,
                error: Some(error.to_string()),
            };
            self.notify(&record);
            history.push(record);

            let Some(delay) = delay else {
                tracing::warn!(label = self.label, attempts = attempt_number, %error, "retries exhausted");
                return Err(RetryError::Exhausted {
                    attempts: attempt_number,
                    last_error: error,
                    history,
                });
            };

            tracing::warn!(
                label = self.label,
                attempt_number,
                max_attempts,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                %error,
                "transient failure, backing off"
            );
            tokio::time::sleep(delay).await;
        }
    }
}

/// Runs `operation` with retry, classifying errors through [`Transience`].
///
/// `policy` defaults to the process-wide admin configuration
/// ([`RetryConfigCache::global`]) when `None`.
///
/// # Errors
///
/// See [`Retry::run`].
pub async fn with_retry<T, E, F, Fut>(
    operation: F,
    policy: Option<RetryPolicy>,
    on_attempt: Option<&mut (dyn FnMut(&RetryAttempt) + Send)>,
) -> Result<T, RetryError<E>>
where
    E: Transience + Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let policy = policy.unwrap_or_else(|| RetryConfigCache::global().policy());
    let retry = Retry::new(policy);
    match on_attempt {
        Some(hook) => retry.on_attempt(move |attempt| hook(attempt)).run(operation).await,
        None => retry.run(operation).await,
    }
}
