//! Submit, poll and convert: one document in, one result object out.

use std::sync::Arc;

use tokio::time::Instant;
use tradeflow_retry::{ProgressReporter, Retry, RetryConfigCache, RetryPolicy};

use crate::client::OcrService;
use crate::poller::{AdaptivePoller, PollOutcome};
use crate::schedule::TimeoutBudget;
use crate::types::{OcrOutcome, OcrResult, PollOperation};

const PROGRESS_STAGE: &str = "ocr";

/// Runs documents through an [`OcrService`].
///
/// [`process`](Self::process) never fails: submission errors, service-side
/// failures and timeouts all come back as an [`OcrResult`] carrying `error`.
pub struct OcrPipeline {
    service: Arc<dyn OcrService>,
    poller: AdaptivePoller,
    budget: TimeoutBudget,
    submit_policy: Option<RetryPolicy>,
    progress: ProgressReporter,
}

impl std::fmt::Debug for OcrPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OcrPipeline")
            .field("poller", &self.poller)
            .field("budget", &self.budget)
            .field("submit_policy", &self.submit_policy)
            .finish_non_exhaustive()
    }
}

impl OcrPipeline {
    /// A pipeline with the default schedule and budget.
    #[must_use]
    pub fn new(service: Arc<dyn OcrService>) -> Self {
        Self {
            service,
            poller: AdaptivePoller::default(),
            budget: TimeoutBudget::default(),
            submit_policy: None,
            progress: ProgressReporter::disabled(),
        }
    }

    /// Replaces the poller.
    #[must_use]
    pub fn with_poller(mut self, poller: AdaptivePoller) -> Self {
        self.poller = poller;
        self
    }

    /// Replaces the time budget.
    #[must_use]
    pub fn with_budget(mut self, budget: TimeoutBudget) -> Self {
        self.budget = budget;
        self
    }

    /// Retries submission under `policy` instead of the admin policy.
    #[must_use]
    pub fn with_submit_policy(mut self, policy: RetryPolicy) -> Self {
        self.submit_policy = Some(policy);
        self
    }

    /// Pushes progress events at submission, each poll and completion.
    #[must_use]
    pub fn with_progress(mut self, progress: ProgressReporter) -> Self {
        self.progress = progress;
        self
    }

    /// Recognises the text of `document`.
    ///
    /// `pages_estimate` and `high_quality` size the polling budget.
    pub async fn process(&self, document: &[u8], pages_estimate: u32, high_quality: bool) -> OcrResult {
        let started = Instant::now();
        self.progress.report(PROGRESS_STAGE, "submitting document", 5);

        let policy = self
            .submit_policy
            .clone()
            .unwrap_or_else(|| RetryConfigCache::global().policy());
        let progress = &self.progress;
        let submitted = Retry::new(policy)
            .label("ocr submit")
            .on_attempt(move |attempt| {
                if attempt.will_retry() {
                    progress.attempt(PROGRESS_STAGE, attempt);
                }
            })
            .run(|| self.service.submit(document))
            .await;

        let operation_id = match submitted {
            Ok(operation_id) => operation_id,
            Err(e) => {
                tracing::warn!(error = %e, "OCR submission failed");
                self.progress.report(PROGRESS_STAGE, "OCR submission failed", 100);
                return OcrResult::failure(OcrOutcome::Errored, format!("OCR submission failed: {e}"));
            }
        };

        let budget = self.budget.for_document(pages_estimate, high_quality);
        tracing::info!(
            pages_estimate,
            high_quality,
            budget_secs = budget.as_secs_f64(),
            "OCR operation submitted"
        );
        self.progress.report(PROGRESS_STAGE, "document submitted", 10);

        let outcome = self
            .poller
            .run(self.service.as_ref(), PollOperation::new(operation_id), budget, &self.progress)
            .await;

        let result = match outcome {
            PollOutcome::Succeeded { lines, operation } => {
                let processing_time = started.elapsed().as_secs_f64();
                tracing::info!(
                    lines = lines.len(),
                    polls = operation.poll_count,
                    processing_time,
                    "OCR complete"
                );
                OcrResult::success(lines, processing_time)
            }
            PollOutcome::Failed { operation } => {
                tracing::warn!(polls = operation.poll_count, "OCR operation failed");
                OcrResult::failure(OcrOutcome::Failed, "OCR operation failed")
            }
            PollOutcome::TimedOut { operation, budget } => OcrResult::failure(
                OcrOutcome::TimedOut,
                format!(
                    "OCR timed out after {:.1}s with status {}",
                    budget.as_secs_f64(),
                    operation.status
                ),
            ),
            PollOutcome::Errored { error, .. } => {
                OcrResult::failure(OcrOutcome::Errored, format!("OCR status query failed: {error}"))
            }
        };

        let message = if result.is_success() {
            "OCR complete"
        } else {
            "OCR finished with an error"
        };
        self.progress.report(PROGRESS_STAGE, message, 100);
        result
    }
}
