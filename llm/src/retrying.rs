//! Retry decorator for any completion backend.

use async_trait::async_trait;
use tradeflow_retry::{ProgressReporter, Retry, RetryConfigCache, RetryError, RetryPolicy};

use crate::backend::CompletionBackend;
use crate::error::LlmError;
use crate::types::{Completion, CompletionRequest};

/// Wraps a backend so every call is retried on transient errors.
///
/// Fatal errors come back unchanged after one call; exhausted retries come
/// back as [`LlmError::RetriesExhausted`] carrying the last error.
#[derive(Debug)]
pub struct RetryingBackend<B> {
    inner: B,
    policy: Option<RetryPolicy>,
    progress: Option<ProgressReporter>,
}

impl<B: CompletionBackend> RetryingBackend<B> {
    /// Retries under the process-wide admin policy.
    pub const fn new(inner: B) -> Self {
        Self {
            inner,
            policy: None,
            progress: None,
        }
    }

    /// Retries under a fixed policy instead of the admin one.
    #[must_use]
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = Some(policy);
        self
    }

    /// Pushes a progress event after every attempt.
    #[must_use]
    pub fn with_progress(mut self, progress: ProgressReporter) -> Self {
        self.progress = Some(progress);
        self
    }

    /// The fixed policy, if one replaces the admin policy.
    pub const fn policy(&self) -> Option<&RetryPolicy> {
        self.policy.as_ref()
    }

    /// The wrapped backend.
    pub const fn inner(&self) -> &B {
        &self.inner
    }
}

/// Collapses a retry failure into a single backend error.
fn flatten(error: RetryError<LlmError>) -> LlmError {
    match error {
        RetryError::Exhausted {
            attempts, last_error, ..
        } => LlmError::RetriesExhausted {
            attempts,
            source: Box::new(last_error),
        },
        RetryError::Fatal { error, .. } => error,
    }
}

#[async_trait]
impl<B: CompletionBackend> CompletionBackend for RetryingBackend<B> {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    fn model(&self) -> &str {
        self.inner.model()
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, LlmError> {
        let policy = self
            .policy
            .clone()
            .unwrap_or_else(|| RetryConfigCache::global().policy());
        let mut retry = Retry::new(policy).label(self.inner.name());
        if let Some(progress) = &self.progress {
            retry = retry.on_attempt(move |attempt| {
                if attempt.attempt_number > 1 || attempt.will_retry() {
                    progress.attempt("llm_retry", attempt);
                }
            });
        }
        retry.run(|| self.inner.complete(request)).await.map_err(flatten)
    }
}
