//! Chat completion request and response types shared by every backend.

use serde::{Deserialize, Serialize};

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Instructions that frame the conversation.
    System,
    /// The end user's input.
    User,
    /// A previous model reply.
    Assistant,
}

/// A single chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Who wrote the message.
    pub role: Role,
    /// Message text.
    pub content: String,
}

impl ChatMessage {
    /// A system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    /// A user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// An assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Parameters of one completion call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionRequest {
    /// Model or deployment override; `None` uses the backend's configured one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Conversation so far.
    pub messages: Vec<ChatMessage>,
    /// Sampling temperature.
    pub temperature: f32,
    /// Upper bound on generated tokens.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl CompletionRequest {
    /// A request with the given messages, temperature 0 and no token limit.
    #[must_use]
    pub const fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            model: None,
            messages,
            temperature: 0.0,
            max_tokens: None,
        }
    }

    /// A system + user prompt pair.
    pub fn prompt(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self::new(vec![ChatMessage::system(system), ChatMessage::user(user)])
    }

    /// Overrides the model or deployment.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Sets the sampling temperature.
    #[must_use]
    pub const fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Sets the token limit.
    #[must_use]
    pub const fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// Why the model stopped generating.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// Natural end of the reply.
    Stop,
    /// The token limit cut the reply off.
    Length,
    /// The provider's content filter intervened.
    ContentFilter,
    /// Any other provider-specific reason.
    #[serde(untagged)]
    Other(String),
}

/// The model's reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    /// Raw reply text, never modified.
    pub content: String,
    /// Stop reason, when the provider reports one.
    pub finish_reason: Option<FinishReason>,
}

impl Completion {
    /// A reply that ended naturally.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            finish_reason: Some(FinishReason::Stop),
        }
    }

    /// Returns `true` if the provider reports the token limit cut the reply off.
    #[must_use]
    pub fn hit_token_limit(&self) -> bool {
        self.finish_reason == Some(FinishReason::Length)
    }
}
