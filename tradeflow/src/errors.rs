//! Public error types for tradeflow.

use thiserror::Error;

/// Errors surfaced by the assistant and the `tradeflow` binary.
///
/// Component errors are wrapped with their chain preserved.
#[derive(Debug, Error)]
pub enum Error {
    /// Completion backend error.
    #[error("{0}")]
    Llm(#[from] tradeflow_llm::LlmError),

    /// Record generation exhausted its attempts or hit a fatal backend error.
    #[error("{0}")]
    Generation(#[from] tradeflow_llm::GenerationError),

    /// OCR client error.
    #[error("{0}")]
    Ocr(#[from] tradeflow_ocr::OcrError),

    /// The retry configuration could not be read or written.
    #[error("{0}")]
    RetryConfig(#[from] tradeflow_retry::ConfigError),

    /// Reading input or writing output failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Output could not be serialized.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error (missing or invalid settings).
    #[error("Configuration error: {0}")]
    Config(String),

    /// Command-level failure with context.
    #[error("{0:#}")]
    Command(#[from] anyhow::Error),
}
