//! Admin-editable retry configuration.
//!
//! The document is YAML (or JSON when the file ends in `.json`) with the keys
//! below. Missing keys take their defaults; a missing or malformed file yields
//! the full default configuration instead of an error.
//!
//! ```yaml
//! max_retries: 3                 # clamped to [1, 10]
//! retry_delay_seconds: 2.0
//! retry_on_failure: true
//! fallback_to_original_classifier: true
//! return_partial_results: true
//! log_errors: true
//! max_delay_seconds: 60.0        # optional
//! jitter: true                   # optional
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock, PoisonError, RwLock};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::policy::{
    clamp_retries, seconds, RetryPolicy, DEFAULT_BASE_DELAY, DEFAULT_MAX_DELAY,
    DEFAULT_MAX_RETRIES,
};

/// Environment variable overriding the config file location.
pub const CONFIG_ENV_VAR: &str = "TRADEFLOW_RETRY_CONFIG";

/// Retry settings an operator can edit without redeploying.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawAdminRetryConfig")]
pub struct AdminRetryConfig {
    /// Total attempts per call, within `[1, 10]`.
    pub max_retries: u32,
    /// Base backoff delay in seconds, never negative.
    pub retry_delay_seconds: f64,
    /// When `false`, every call gets exactly one attempt.
    pub retry_on_failure: bool,
    /// Whether callers may fall back to the keyword classifier when LLM
    /// classification fails.
    pub fallback_to_original_classifier: bool,
    /// Whether partially recovered results are returned instead of an error.
    pub return_partial_results: bool,
    /// Whether failed attempts are logged at `warn` level.
    pub log_errors: bool,
    /// Ceiling for a single backoff delay in seconds.
    pub max_delay_seconds: f64,
    /// Whether backoff delays are randomised.
    pub jitter: bool,
}

impl Default for AdminRetryConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay_seconds: DEFAULT_BASE_DELAY.as_secs_f64(),
            retry_on_failure: true,
            fallback_to_original_classifier: true,
            return_partial_results: true,
            log_errors: true,
            max_delay_seconds: DEFAULT_MAX_DELAY.as_secs_f64(),
            jitter: true,
        }
    }
}

/// Lenient on-disk form: every key optional, numbers unclamped.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawAdminRetryConfig {
    max_retries: Option<i64>,
    retry_delay_seconds: Option<f64>,
    retry_on_failure: Option<bool>,
    fallback_to_original_classifier: Option<bool>,
    return_partial_results: Option<bool>,
    log_errors: Option<bool>,
    max_delay_seconds: Option<f64>,
    jitter: Option<bool>,
}

impl From<RawAdminRetryConfig> for AdminRetryConfig {
    fn from(raw: RawAdminRetryConfig) -> Self {
        let defaults = Self::default();
        Self {
            max_retries: raw
                .max_retries
                .map_or(defaults.max_retries, clamp_retries),
            retry_delay_seconds: raw
                .retry_delay_seconds
                .map_or(defaults.retry_delay_seconds, |s| {
                    seconds(s, DEFAULT_BASE_DELAY).as_secs_f64()
                }),
            retry_on_failure: raw.retry_on_failure.unwrap_or(defaults.retry_on_failure),
            fallback_to_original_classifier: raw
                .fallback_to_original_classifier
                .unwrap_or(defaults.fallback_to_original_classifier),
            return_partial_results: raw
                .return_partial_results
                .unwrap_or(defaults.return_partial_results),
            log_errors: raw.log_errors.unwrap_or(defaults.log_errors),
            max_delay_seconds: raw
                .max_delay_seconds
                .map_or(defaults.max_delay_seconds, |s| {
                    seconds(s, DEFAULT_MAX_DELAY).as_secs_f64()
                }),
            jitter: raw.jitter.unwrap_or(defaults.jitter),
        }
    }
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

impl AdminRetryConfig {
    /// Default file location: `$TRADEFLOW_RETRY_CONFIG`, else
    /// `<config dir>/tradeflow/retry_config.yaml`.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        std::env::var_os(CONFIG_ENV_VAR)
            .map(PathBuf::from)
            .or_else(|| dirs::config_dir().map(|dir| dir.join("tradeflow").join("retry_config.yaml")))
    }

    /// Parses a YAML document.
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(text)?)
    }

    /// Parses a JSON document.
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_json::from_str(text)?)
    }

    /// Reads the file at `path`, reporting any problem.
    pub fn try_load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        if is_json(path) {
            Self::from_json_str(&text)
        } else {
            Self::from_yaml_str(&text)
        }
    }

    /// Reads the file at `path`, falling back to defaults on any problem.
    #[must_use]
    pub fn load(path: &Path) -> Self {
        match Self::try_load(path) {
            Ok(config) => {
                tracing::debug!(path = %path.display(), ?config, "loaded retry config");
                config
            }
            Err(ConfigError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no retry config file, using defaults");
                Self::default()
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "unusable retry config, using defaults");
                Self::default()
            }
        }
    }

    /// Reads the config from [`default_path`](Self::default_path), or defaults.
    #[must_use]
    pub fn load_default() -> Self {
        Self::default_path().map_or_else(Self::default, |path| Self::load(&path))
    }

    /// Writes the config to `path`, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let text = if is_json(path) {
            serde_json::to_string_pretty(self)?
        } else {
            serde_yaml::to_string(self)?
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, text)?;
        Ok(())
    }

    /// The retry policy these settings describe.
    #[must_use]
    pub fn to_policy(&self) -> RetryPolicy {
        if !self.retry_on_failure {
            return RetryPolicy::single_attempt();
        }
        RetryPolicy::default()
            .with_max_retries(self.max_retries)
            .with_base_delay(seconds(self.retry_delay_seconds, DEFAULT_BASE_DELAY))
            .with_max_delay(seconds(self.max_delay_seconds, DEFAULT_MAX_DELAY))
            .with_jitter(self.jitter)
    }
}

/// Process-wide, read-mostly holder of the admin retry config.
///
/// Readers get a cheap `Arc` snapshot; [`reload`](Self::reload) and
/// [`replace`](Self::replace) swap the whole config at once.
#[derive(Debug)]
pub struct RetryConfigCache {
    path: Option<PathBuf>,
    current: RwLock<Arc<AdminRetryConfig>>,
}

static GLOBAL: LazyLock<RetryConfigCache> =
    LazyLock::new(|| RetryConfigCache::open(AdminRetryConfig::default_path()));

impl RetryConfigCache {
    /// Loads the config from `path` (defaults when `None` or unreadable).
    #[must_use]
    pub fn open(path: Option<PathBuf>) -> Self {
        let config = path
            .as_deref()
            .map_or_else(AdminRetryConfig::default, AdminRetryConfig::load);
        Self {
            path,
            current: RwLock::new(Arc::new(config)),
        }
    }

    /// Wraps an already-built config with no backing file.
    #[must_use]
    pub fn fixed(config: AdminRetryConfig) -> Self {
        Self {
            path: None,
            current: RwLock::new(Arc::new(config)),
        }
    }

    /// The process-wide cache, loaded from the default path on first use.
    #[must_use]
    pub fn global() -> &'static Self {
        &GLOBAL
    }

    /// The backing file, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Current config snapshot.
    #[must_use]
    pub fn get(&self) -> Arc<AdminRetryConfig> {
        Arc::clone(&self.current.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Policy derived from the current snapshot.
    #[must_use]
    pub fn policy(&self) -> RetryPolicy {
        self.get().to_policy()
    }

    /// Swaps in a new config.
    pub fn replace(&self, config: AdminRetryConfig) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(config);
    }

    /// Re-reads the backing file and swaps it in wholesale.
    pub fn reload(&self) -> Arc<AdminRetryConfig> {
        if let Some(path) = &self.path {
            self.replace(AdminRetryConfig::load(path));
        }
        self.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_yaml_all_keys() {
        let config = AdminRetryConfig::from_yaml_str(
            "max_retries: 5\nretry_delay_seconds: 1.5\nretry_on_failure: true\n\
             fallback_to_original_classifier: false\nreturn_partial_results: false\nlog_errors: false\n",
        )
        .unwrap_or_default();
        assert_eq!(config.max_retries, 5);
        assert!((config.retry_delay_seconds - 1.5).abs() < f64::EPSILON);
        assert!(!config.fallback_to_original_classifier);
        assert!(!config.return_partial_results);
        assert!(!config.log_errors);
    }

    #[test]
    fn test_max_retries_clamped_on_load() {
        let low = AdminRetryConfig::from_yaml_str("max_retries: 0").unwrap_or_default();
        let high = AdminRetryConfig::from_yaml_str("max_retries: 15").unwrap_or_default();
        let negative = AdminRetryConfig::from_json_str("{\"max_retries\": -2}").unwrap_or_default();
        assert_eq!(low.max_retries, 1);
        assert_eq!(high.max_retries, 10);
        assert_eq!(negative.max_retries, 1);
        assert_eq!(low.to_policy().max_retries(), 1);
        assert_eq!(high.to_policy().max_retries(), 10);
    }

    #[test]
    fn test_missing_keys_default() {
        let config = AdminRetryConfig::from_json_str("{\"log_errors\": false}").unwrap_or_default();
        assert_eq!(config.max_retries, 3);
        assert!((config.retry_delay_seconds - 2.0).abs() < f64::EPSILON);
        assert!(!config.log_errors);
        assert!(config.retry_on_failure);
    }

    #[test]
    fn test_empty_document_is_default() {
        assert_eq!(AdminRetryConfig::from_yaml_str("  \n").ok(), Some(AdminRetryConfig::default()));
    }

    #[test]
    fn test_negative_delay_is_zero() {
        let config = AdminRetryConfig::from_yaml_str("retry_delay_seconds: -4").unwrap_or_default();
        assert_eq!(config.retry_delay_seconds, 0.0);
        assert_eq!(config.to_policy().base_delay(), Duration::ZERO);
    }

    #[test]
    fn test_malformed_values_rejected_by_try() {
        assert!(AdminRetryConfig::from_yaml_str("max_retries: lots").is_err());
        assert!(AdminRetryConfig::from_json_str("{not json").is_err());
    }

    #[test]
    fn test_retry_disabled_policy() {
        let config = AdminRetryConfig {
            retry_on_failure: false,
            max_retries: 7,
            ..AdminRetryConfig::default()
        };
        assert_eq!(config.to_policy().max_retries(), 1);
    }

    #[test]
    fn test_policy_from_defaults() {
        let policy = AdminRetryConfig::default().to_policy();
        assert_eq!(policy.max_retries(), 3);
        assert_eq!(policy.base_delay(), Duration::from_secs(2));
        assert_eq!(policy.max_delay(), Duration::from_secs(60));
    }

    #[test]
    fn test_fixed_cache_replace() {
        let cache = RetryConfigCache::fixed(AdminRetryConfig::default());
        assert_eq!(cache.policy().max_retries(), 3);
        cache.replace(AdminRetryConfig {
            max_retries: 6,
            ..AdminRetryConfig::default()
        });
        assert_eq!(cache.get().max_retries, 6);
        // no backing file: reload keeps the replaced value
        assert_eq!(cache.reload().max_retries, 6);
    }
}
