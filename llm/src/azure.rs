//! Azure OpenAI chat completions.

use async_trait::async_trait;

use crate::backend::CompletionBackend;
use crate::error::LlmError;
use crate::provider::AzureSettings;
use crate::types::{Completion, CompletionRequest};
use crate::wire::{self, ChatBody};

/// Azure OpenAI deployment client.
///
/// Sends `POST {endpoint}/openai/deployments/{deployment}/chat/completions`
/// authenticated with the `api-key` header. The deployment is part of the URL,
/// so a request's model override selects a different deployment.
#[derive(Debug, Clone)]
pub struct AzureOpenAi {
    client: reqwest::Client,
    settings: AzureSettings,
}

impl AzureOpenAi {
    /// Creates a client over an existing HTTP client.
    #[must_use]
    pub const fn new(client: reqwest::Client, settings: AzureSettings) -> Self {
        Self { client, settings }
    }

    /// Chat completions URL for `deployment`.
    #[must_use]
    pub fn url(&self, deployment: &str) -> String {
        format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            self.settings.endpoint.trim_end_matches('/'),
            deployment,
            self.settings.api_version
        )
    }
}

#[async_trait]
impl CompletionBackend for AzureOpenAi {
    fn name(&self) -> &'static str {
        "azure"
    }

    fn model(&self) -> &str {
        &self.settings.deployment
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, LlmError> {
        let deployment = request.model.as_deref().unwrap_or(&self.settings.deployment);
        let url = self.url(deployment);
        tracing::debug!(deployment, messages = request.messages.len(), "azure completion");
        let builder = self
            .client
            .post(url)
            .header("api-key", self.settings.api_key.expose());
        wire::send(builder, &ChatBody::without_model(request)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ApiKey;

    #[test]
    fn test_url_layout() {
        let backend = AzureOpenAi::new(
            reqwest::Client::new(),
            AzureSettings {
                endpoint: "https://tf.openai.azure.com/".into(),
                deployment: "gpt-4o".into(),
                api_key: ApiKey::new("k"),
                api_version: "2024-02-15-preview".into(),
            },
        );
        assert_eq!(
            backend.url("gpt-4o"),
            "https://tf.openai.azure.com/openai/deployments/gpt-4o/chat/completions?api-version=2024-02-15-preview"
        );
        assert_eq!(backend.model(), "gpt-4o");
        assert_eq!(backend.name(), "azure");
    }
}
