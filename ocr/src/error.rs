//! Errors from OCR submission and status queries.

use thiserror::Error;
use tradeflow_retry::{is_transient_status, Transience};

/// Failure of a single OCR service call.
#[derive(Debug, Error)]
pub enum OcrError {
    /// The service answered with a non-success status.
    #[error("OCR service returned HTTP {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, truncated.
        body: String,
    },

    /// The request never produced a response.
    #[error("OCR request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Submission was accepted without an operation handle.
    #[error("OCR submission response had no Operation-Location header")]
    MissingOperationLocation,

    /// The response body could not be decoded.
    #[error("could not decode OCR response: {0}")]
    Decode(String),

    /// Required settings are missing.
    #[error("invalid OCR configuration: {0}")]
    Config(String),
}

impl Transience for OcrError {
    fn is_transient(&self) -> bool {
        match self {
            Self::Status { status, .. } => is_transient_status(*status),
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::MissingOperationLocation | Self::Decode(_) | Self::Config(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        let throttled = OcrError::Status {
            status: 429,
            body: String::new(),
        };
        let bad_key = OcrError::Status {
            status: 401,
            body: String::new(),
        };
        assert!(throttled.is_transient());
        assert!(!bad_key.is_transient());
        assert!(!OcrError::MissingOperationLocation.is_transient());
    }
}
