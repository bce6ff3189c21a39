//! Application configuration, built once at startup.

use std::path::PathBuf;
use std::time::Duration;

use tradeflow_llm::provider::DEFAULT_REQUEST_TIMEOUT;
use tradeflow_llm::ProviderConfig;
use tradeflow_ocr::{AzureVisionSettings, PollSchedule, TimeoutBudget};
use tradeflow_retry::policy::seconds;
use tradeflow_retry::{AdminRetryConfig, RetryConfigCache, CONFIG_ENV_VAR};

use crate::errors::Error;

/// Base OCR budget in seconds.
pub const OCR_BASE_TIMEOUT_ENV_VAR: &str = "TRADEFLOW_OCR_BASE_TIMEOUT";
/// Additional OCR budget per page in seconds.
pub const OCR_PAGE_TIMEOUT_ENV_VAR: &str = "TRADEFLOW_OCR_PAGE_TIMEOUT";
/// Per-request HTTP timeout in seconds.
pub const REQUEST_TIMEOUT_ENV_VAR: &str = "TRADEFLOW_REQUEST_TIMEOUT";

/// Immutable application configuration.
///
/// Built once (usually with [`AppConfig::from_env`]) and passed by reference
/// to everything that needs it; nothing reads the environment afterwards.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Completion provider, if one is configured.
    pub provider: Option<ProviderConfig>,
    /// Why the provider could not be configured.
    pub provider_error: Option<String>,
    /// OCR service, if one is configured.
    pub vision: Option<AzureVisionSettings>,
    /// Admin retry config file (`None` = defaults only).
    pub retry_config_path: Option<PathBuf>,
    /// Per-request HTTP timeout.
    ///
    /// Default: 120 seconds
    pub request_timeout: Duration,
    /// OCR polling budget.
    pub ocr_budget: TimeoutBudget,
    /// OCR poll intervals.
    pub poll_schedule: PollSchedule,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            provider: None,
            provider_error: None,
            vision: None,
            retry_config_path: AdminRetryConfig::default_path(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            ocr_budget: TimeoutBudget::default(),
            poll_schedule: PollSchedule::default(),
        }
    }
}

impl AppConfig {
    /// Reads the configuration from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the configuration through `lookup`.
    ///
    /// A missing provider or OCR service is not an error here; commands that
    /// need one fail with [`Error::Config`] when they ask for it.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let secs = |key: &str, fallback: Duration| {
            lookup(key)
                .and_then(|v| v.trim().parse::<f64>().ok())
                .map_or(fallback, |v| seconds(v, fallback))
        };
        let default_budget = TimeoutBudget::default().for_document(0, false);

        let (provider, provider_error) = match ProviderConfig::from_lookup(&lookup) {
            Ok(provider) => (Some(provider), None),
            Err(e) => {
                tracing::debug!(error = %e, "no completion provider configured");
                (None, Some(e.to_string()))
            }
        };

        Self {
            provider,
            provider_error,
            vision: AzureVisionSettings::from_lookup(&lookup).ok(),
            retry_config_path: lookup(CONFIG_ENV_VAR)
                .map(PathBuf::from)
                .or(defaults.retry_config_path),
            request_timeout: secs(REQUEST_TIMEOUT_ENV_VAR, defaults.request_timeout),
            ocr_budget: TimeoutBudget::new(
                secs(OCR_BASE_TIMEOUT_ENV_VAR, default_budget),
                secs(OCR_PAGE_TIMEOUT_ENV_VAR, Duration::from_secs(5)),
            ),
            poll_schedule: defaults.poll_schedule,
        }
    }

    /// Uses `path` as the admin retry config file.
    #[must_use]
    pub fn with_retry_config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.retry_config_path = Some(path.into());
        self
    }

    /// Sets the completion provider.
    #[must_use]
    pub fn with_provider(mut self, provider: ProviderConfig) -> Self {
        self.provider = Some(provider);
        self.provider_error = None;
        self
    }

    /// Sets the OCR budget.
    #[must_use]
    pub fn with_ocr_budget(mut self, budget: TimeoutBudget) -> Self {
        self.ocr_budget = budget;
        self
    }

    /// The completion provider, or a configuration error naming what is missing.
    pub fn require_provider(&self) -> Result<&ProviderConfig, Error> {
        self.provider.as_ref().ok_or_else(|| {
            Error::Config(
                self.provider_error
                    .clone()
                    .unwrap_or_else(|| "no LLM provider configured".to_owned()),
            )
        })
    }

    /// The OCR service settings, or a configuration error.
    pub fn require_vision(&self) -> Result<&AzureVisionSettings, Error> {
        self.vision.as_ref().ok_or_else(|| {
            Error::Config("AZURE_VISION_ENDPOINT and AZURE_VISION_KEY must be set".to_owned())
        })
    }

    /// Loads the admin retry config from [`retry_config_path`](Self::retry_config_path).
    #[must_use]
    pub fn retry_cache(&self) -> RetryConfigCache {
        RetryConfigCache::open(self.retry_config_path.clone())
    }
}
