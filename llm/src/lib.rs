//! LLM completion backends and robust record generation.
//!
//! A [`CompletionBackend`] is either [`AzureOpenAi`] or [`OpenAi`], chosen once
//! by [`build_backend`] from a [`ProviderConfig`]. [`RetryingBackend`] adds
//! transient-error retry to any backend, and
//! [`RecordGenerator`](generation::RecordGenerator) turns replies into
//! validated JSON records, retrying with feedback when a reply is empty,
//! invalid or cut off.

pub mod azure;
pub mod backend;
pub mod error;
pub mod generation;
pub mod openai;
pub mod provider;
pub mod retrying;
pub mod types;
mod wire;

pub use azure::AzureOpenAi;
pub use backend::CompletionBackend;
pub use error::LlmError;
pub use generation::{GenerationConfig, GenerationError, GenerationMetrics, Generated, RecordGenerator};
pub use openai::OpenAi;
pub use provider::{build_backend, ApiKey, AzureSettings, OpenAiSettings, ProviderConfig};
pub use retrying::RetryingBackend;
pub use types::{ChatMessage, Completion, CompletionRequest, FinishReason, Role};
