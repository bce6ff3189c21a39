//! The completion backend seam.

use async_trait::async_trait;

use crate::error::LlmError;
use crate::types::{Completion, CompletionRequest};

/// A chat completion endpoint.
///
/// Implementations perform exactly one remote call per [`complete`](Self::complete);
/// retrying is layered on top (see [`RetryingBackend`](crate::RetryingBackend)).
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Short provider name used in logs.
    fn name(&self) -> &'static str;

    /// Model or deployment used when the request does not override it.
    fn model(&self) -> &str;

    /// Sends one completion request.
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, LlmError>;
}

#[async_trait]
impl<B> CompletionBackend for std::sync::Arc<B>
where
    B: CompletionBackend + ?Sized,
{
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn model(&self) -> &str {
        (**self).model()
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, LlmError> {
        (**self).complete(request).await
    }
}
