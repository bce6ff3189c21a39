//! Provider selection and backend construction.
//!
//! The provider is chosen once, from configuration, when the process starts;
//! request-handling code only ever sees a [`CompletionBackend`].

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::azure::AzureOpenAi;
use crate::backend::CompletionBackend;
use crate::error::LlmError;
use crate::openai::OpenAi;

/// Selects the provider: `azure` or `openai`.
pub const PROVIDER_ENV_VAR: &str = "LLM_PROVIDER";
/// Azure API version used when none is configured.
pub const DEFAULT_AZURE_API_VERSION: &str = "2024-02-15-preview";
/// OpenAI base URL used when none is configured.
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
/// OpenAI model used when none is configured.
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
/// Per-request HTTP timeout used when none is configured.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// An API key that never appears in `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    /// Wraps a key.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// The raw key, for request headers only.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

/// Azure OpenAI connection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AzureSettings {
    /// Resource endpoint, e.g. `https://name.openai.azure.com`.
    pub endpoint: String,
    /// Default deployment name.
    pub deployment: String,
    /// Resource key.
    pub api_key: ApiKey,
    /// `api-version` query parameter.
    pub api_version: String,
}

/// OpenAI connection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenAiSettings {
    /// API base URL.
    pub base_url: String,
    /// Default model.
    pub model: String,
    /// Bearer token.
    pub api_key: ApiKey,
}

/// Which completion API to talk to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderConfig {
    /// Azure OpenAI deployment.
    Azure(AzureSettings),
    /// Standard OpenAI API.
    OpenAi(OpenAiSettings),
}

impl ProviderConfig {
    /// Reads the provider settings from the process environment.
    pub fn from_env() -> Result<Self, LlmError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the provider settings through `lookup`.
    ///
    /// `LLM_PROVIDER` picks the provider explicitly; otherwise Azure is used
    /// when `AZURE_OPENAI_ENDPOINT` is set and OpenAI when it is not.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, LlmError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let require = |key: &str| get(key).ok_or_else(|| LlmError::Config(format!("{key} is not set")));

        let provider = get(PROVIDER_ENV_VAR).map(|p| p.trim().to_ascii_lowercase());
        let use_azure = match provider.as_deref() {
            Some("azure" | "azure_openai") => true,
            Some("openai") => false,
            Some(other) => {
                return Err(LlmError::Config(format!(
                    "{PROVIDER_ENV_VAR} must be `azure` or `openai`, got `{other}`"
                )))
            }
            None => get("AZURE_OPENAI_ENDPOINT").is_some(),
        };

        if use_azure {
            Ok(Self::Azure(AzureSettings {
                endpoint: require("AZURE_OPENAI_ENDPOINT")?,
                deployment: require("AZURE_OPENAI_DEPLOYMENT")?,
                api_key: ApiKey::new(require("AZURE_OPENAI_API_KEY")?),
                api_version: get("AZURE_OPENAI_API_VERSION")
                    .unwrap_or_else(|| DEFAULT_AZURE_API_VERSION.to_owned()),
            }))
        } else {
            Ok(Self::OpenAi(OpenAiSettings {
                base_url: get("OPENAI_BASE_URL").unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_owned()),
                model: get("OPENAI_MODEL").unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_owned()),
                api_key: ApiKey::new(require("OPENAI_API_KEY")?),
            }))
        }
    }

    /// Provider name as used in logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Azure(_) => "azure",
            Self::OpenAi(_) => "openai",
        }
    }
}

/// Builds the backend for `config` with a per-request HTTP timeout.
pub fn build_backend(
    config: &ProviderConfig,
    timeout: Duration,
) -> Result<Arc<dyn CompletionBackend>, LlmError> {
    let client = reqwest::Client::builder().timeout(timeout).build()?;
    tracing::info!(provider = config.name(), "completion backend selected");
    Ok(match config {
        ProviderConfig::Azure(settings) => Arc::new(AzureOpenAi::new(client, settings.clone())),
        ProviderConfig::OpenAi(settings) => Arc::new(OpenAi::new(client, settings.clone())),
    })
}
