//! Errors returned by completion backends.

use thiserror::Error;
use tradeflow_retry::{is_transient_status, Transience};

/// Failure of a completion call.
#[derive(Debug, Error)]
pub enum LlmError {
    /// The endpoint answered with a non-success status.
    #[error("completion endpoint returned HTTP {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, truncated.
        body: String,
    },

    /// The request never produced a response.
    #[error("completion request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The response body was not a chat completion.
    #[error("could not decode completion response: {0}")]
    Decode(String),

    /// The response contained no choices.
    #[error("completion response contained no choices")]
    EmptyResponse,

    /// Required settings are missing or invalid.
    #[error("invalid LLM configuration: {0}")]
    Config(String),

    /// Every retry attempt failed with a transient error.
    #[error("completion failed after {attempts} attempts: {source}")]
    RetriesExhausted {
        /// Attempts consumed.
        attempts: u32,
        /// Error of the final attempt.
        source: Box<LlmError>,
    },
}

impl Transience for LlmError {
    fn is_transient(&self) -> bool {
        match self {
            Self::Status { status, .. } => is_transient_status(*status),
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::Decode(_) | Self::EmptyResponse | Self::Config(_) | Self::RetriesExhausted { .. } => {
                false
            }
        }
    }
}
