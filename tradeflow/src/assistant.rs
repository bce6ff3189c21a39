//! Wires the completion backend, record generator and OCR pipeline together.

use std::sync::Arc;

use tradeflow_llm::generation::GenerationConfig;
use tradeflow_llm::{build_backend, CompletionBackend, RecordGenerator};
use tradeflow_ocr::{AdaptivePoller, AzureReadClient, OcrError, OcrPipeline, OcrService};
use tradeflow_retry::{AdminRetryConfig, ProgressReporter, RetryConfigCache};

use crate::config::AppConfig;
use crate::errors::Error;

/// Entry point for the assistant's LLM and OCR plumbing.
///
/// Every component built here receives the admin retry policy explicitly,
/// read from the assistant's own [`RetryConfigCache`]. Call
/// [`reload_retry_config`](Self::reload_retry_config) after the admin file
/// changes; components built afterwards see the new values.
#[derive(Debug)]
pub struct Assistant {
    config: AppConfig,
    retry: RetryConfigCache,
    progress: ProgressReporter,
}

impl Assistant {
    /// Creates an assistant, loading the admin retry config from
    /// `config.retry_config_path`.
    #[must_use]
    pub fn new(config: AppConfig) -> Self {
        let retry = config.retry_cache();
        Self::with_retry_cache(config, retry)
    }

    /// Creates an assistant around an existing retry config cache.
    #[must_use]
    pub fn with_retry_cache(config: AppConfig, retry: RetryConfigCache) -> Self {
        Self {
            config,
            retry,
            progress: ProgressReporter::disabled(),
        }
    }

    /// Pushes progress for every component built afterwards to `progress`.
    #[must_use]
    pub fn with_progress(mut self, progress: ProgressReporter) -> Self {
        self.progress = progress;
        self
    }

    /// The application configuration.
    #[must_use]
    pub const fn config(&self) -> &AppConfig {
        &self.config
    }

    /// The admin retry settings currently in effect.
    #[must_use]
    pub fn retry_config(&self) -> Arc<AdminRetryConfig> {
        self.retry.get()
    }

    /// Re-reads the admin retry file.
    pub fn reload_retry_config(&self) -> Arc<AdminRetryConfig> {
        self.retry.reload()
    }

    /// A record generator on the configured provider.
    pub fn generator(&self) -> Result<RecordGenerator, Error> {
        let provider = self.config.require_provider()?;
        let backend = build_backend(provider, self.config.request_timeout)?;
        Ok(self.generator_on(backend))
    }

    /// A record generator on `backend`.
    #[must_use]
    pub fn generator_on(&self, backend: Arc<dyn CompletionBackend>) -> RecordGenerator {
        let admin = self.retry.get();
        RecordGenerator::with_config(backend, GenerationConfig::from_admin(&admin))
            .with_completion_policy(admin.to_policy())
            .with_progress(self.progress.clone())
    }

    /// An OCR pipeline on the configured Read API endpoint.
    pub fn ocr_pipeline(&self) -> Result<OcrPipeline, Error> {
        let vision = self.config.require_vision()?;
        let client = reqwest::Client::builder()
            .timeout(self.config.request_timeout)
            .build()
            .map_err(OcrError::from)?;
        Ok(self.ocr_pipeline_on(Arc::new(AzureReadClient::new(client, vision.clone()))))
    }

    /// An OCR pipeline on `service`.
    #[must_use]
    pub fn ocr_pipeline_on(&self, service: Arc<dyn OcrService>) -> OcrPipeline {
        let policy = self.retry.policy();
        OcrPipeline::new(service)
            .with_poller(
                AdaptivePoller::new(self.config.poll_schedule.clone())
                    .with_query_policy(policy.clone()),
            )
            .with_budget(self.config.ocr_budget.clone())
            .with_submit_policy(policy)
            .with_progress(self.progress.clone())
    }
}
