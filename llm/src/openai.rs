//! Standard OpenAI chat completions.

use async_trait::async_trait;

use crate::backend::CompletionBackend;
use crate::error::LlmError;
use crate::provider::OpenAiSettings;
use crate::types::{Completion, CompletionRequest};
use crate::wire::{self, ChatBody};

/// OpenAI API client (`POST {base_url}/chat/completions` with a bearer token).
#[derive(Debug, Clone)]
pub struct OpenAi {
    client: reqwest::Client,
    settings: OpenAiSettings,
}

impl OpenAi {
    /// Creates a client over an existing HTTP client.
    #[must_use]
    pub const fn new(client: reqwest::Client, settings: OpenAiSettings) -> Self {
        Self { client, settings }
    }

    /// Chat completions URL.
    #[must_use]
    pub fn url(&self) -> String {
        format!("{}/chat/completions", self.settings.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl CompletionBackend for OpenAi {
    fn name(&self) -> &'static str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.settings.model
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, LlmError> {
        tracing::debug!(
            model = request.model.as_deref().unwrap_or(&self.settings.model),
            messages = request.messages.len(),
            "openai completion"
        );
        let builder = self
            .client
            .post(self.url())
            .bearer_auth(self.settings.api_key.expose());
        wire::send(builder, &ChatBody::new(request, Some(&self.settings.model))).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ApiKey;

    #[test]
    fn test_url_layout() {
        let backend = OpenAi::new(
            reqwest::Client::new(),
            OpenAiSettings {
                base_url: "https://api.openai.com/v1/".into(),
                model: "gpt-4o-mini".into(),
                api_key: ApiKey::new("sk-test"),
            },
        );
        assert_eq!(backend.url(), "https://api.openai.com/v1/chat/completions");
        assert_eq!(backend.model(), "gpt-4o-mini");
    }
}
