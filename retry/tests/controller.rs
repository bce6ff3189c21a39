//! Retry loop behaviour under simulated time.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::Instant;
use tradeflow_retry::{
    with_retry, AttemptOutcome, Retry, RetryAttempt, RetryError, RetryPolicy, Transience,
};

#[derive(Debug, Clone, PartialEq, Eq)]
enum CallError {
    RateLimited(u32),
    Unauthorized,
}

impl std::fmt::Display for CallError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RateLimited(n) => write!(f, "429 on call {n}"),
            Self::Unauthorized => write!(f, "401 unauthorized"),
        }
    }
}

impl Transience for CallError {
    fn is_transient(&self) -> bool {
        matches!(self, Self::RateLimited(_))
    }
}

fn policy(max_retries: u32) -> RetryPolicy {
    RetryPolicy::new(max_retries, Duration::from_secs(2))
        .with_max_delay(Duration::from_secs(60))
        .with_jitter(false)
}

#[tokio::test(start_paused = true)]
async fn always_transient_runs_exactly_max_retries_times() {
    for max_retries in [1, 3, 5] {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = Retry::new(policy(max_retries))
            .run(|| {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                async move { Err(CallError::RateLimited(n)) }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), max_retries);
        let err = result.unwrap_err();
        assert!(!err.is_fatal());
        assert_eq!(err.attempts(), max_retries);
        assert_eq!(err.last_error(), &CallError::RateLimited(max_retries));
        assert_eq!(err.history().len(), max_retries as usize);
    }
}

#[tokio::test(start_paused = true)]
async fn fatal_error_is_not_retried() {
    let calls = AtomicU32::new(0);
    let start = Instant::now();
    let result: Result<(), _> = Retry::new(policy(5))
        .run(|| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(CallError::Unauthorized) }
        })
        .await;

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(start.elapsed(), Duration::ZERO);
    match result {
        Err(RetryError::Fatal { attempt, error, history }) => {
            assert_eq!(attempt, 1);
            assert_eq!(error, CallError::Unauthorized);
            assert_eq!(history[0].outcome, AttemptOutcome::FatalError);
        }
        other => panic!("expected fatal error, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn succeeds_after_transient_failures_with_backoff() {
    let calls = AtomicU32::new(0);
    let start = Instant::now();
    let value = Retry::new(policy(5))
        .run(|| {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if n < 3 {
                    Err(CallError::RateLimited(n))
                } else {
                    Ok("records")
                }
            }
        })
        .await
        .unwrap();

    assert_eq!(value, "records");
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    // 2s before attempt 2, 4s before attempt 3
    assert_eq!(start.elapsed(), Duration::from_secs(6));
}

#[tokio::test(start_paused = true)]
async fn hook_sees_every_attempt_before_the_sleep() {
    let seen: Arc<Mutex<Vec<(RetryAttempt, Instant)>>> = Arc::default();
    let sink = Arc::clone(&seen);
    let result: Result<(), _> = Retry::new(policy(3))
        .label("classify intent")
        .on_attempt(move |attempt| {
            sink.lock().unwrap().push((attempt.clone(), Instant::now()));
        })
        .run(|| async { Err(CallError::RateLimited(0)) })
        .await;
    assert!(result.is_err());

    let seen = seen.lock().unwrap();
    let summaries: Vec<_> = seen.iter().map(|(a, _)| a.summary()).collect();
    assert_eq!(
        summaries,
        ["retry 2/3 in 2s", "retry 3/3 in 4s", "attempt 3/3 failed, no retries left"]
    );
    // the hook for attempt n fires before its delay is slept
    let gap = seen[1].1 - seen[0].1;
    assert_eq!(gap, Duration::from_secs(2));
}

#[tokio::test(start_paused = true)]
async fn total_backoff_is_bounded_by_max_delay() {
    let start = Instant::now();
    let policy = RetryPolicy::new(10, Duration::from_secs(2))
        .with_max_delay(Duration::from_secs(5))
        .with_jitter(true);
    let result: Result<(), _> = Retry::new(policy)
        .run(|| async { Err(CallError::RateLimited(0)) })
        .await;

    assert_eq!(result.unwrap_err().attempts(), 10);
    assert!(start.elapsed() <= Duration::from_secs(9 * 5));
}

#[tokio::test(start_paused = true)]
async fn custom_classifier_overrides_transience() {
    let calls = AtomicU32::new(0);
    let result: Result<(), _> = Retry::with_classifier(policy(4), |e: &String| e.starts_with("5"))
        .run(|| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err("503 unavailable".to_owned()) }
        })
        .await;
    assert_eq!(calls.load(Ordering::SeqCst), 4);
    assert!(matches!(result, Err(RetryError::Exhausted { attempts: 4, .. })));
}

#[tokio::test(start_paused = true)]
async fn with_retry_accepts_borrowed_hook() {
    let mut outcomes = Vec::new();
    let mut hook = |attempt: &RetryAttempt| outcomes.push(attempt.outcome);
    let calls = AtomicU32::new(0);
    let value = with_retry(
        || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Err(CallError::RateLimited(1))
                } else {
                    Ok(n)
                }
            }
        },
        Some(policy(3)),
        Some(&mut hook as &mut (dyn FnMut(&RetryAttempt) + Send)),
    )
    .await
    .unwrap();

    assert_eq!(value, 1);
    assert_eq!(
        outcomes,
        [AttemptOutcome::TransientError, AttemptOutcome::Success]
    );
}
