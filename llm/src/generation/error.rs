//! Error types for generation calls with attempt history.

use std::time::Duration;

use thiserror::Error;
use tradeflow_recovery::Stage;

use super::metrics::GenerationMetrics;
use crate::error::LlmError;

/// Record of a single generation attempt that did not produce a usable result.
#[derive(Debug, Clone)]
pub struct AttemptRecord {
    /// The attempt number (1-indexed).
    pub attempt_number: u32,
    /// What was recovered from the reply (`[]`/`{}` if nothing).
    pub recovered: serde_json::Value,
    /// Recovery stage that produced `recovered`.
    pub stage: Option<Stage>,
    /// Why the attempt was rejected.
    pub errors: Vec<String>,
    /// Raw model reply.
    pub raw_output: String,
    /// Elapsed time at this attempt.
    pub elapsed: Duration,
}

/// Errors that can occur during record generation.
#[derive(Debug, Error)]
pub enum GenerationError {
    /// Every attempt produced an empty or invalid result.
    #[error("generation failed after {attempts} attempts (max: {max_attempts})")]
    MaxRetriesExceeded {
        /// Number of attempts made.
        attempts: u32,
        /// Maximum attempts allowed.
        max_attempts: u32,
        /// History of every rejected attempt.
        history: Vec<AttemptRecord>,
        /// Raw reply of the final attempt.
        raw_output: String,
        /// Metrics tracked across all attempts.
        metrics: GenerationMetrics,
    },

    /// The completion call failed, after its own retries.
    #[error("completion failed at generation attempt {attempt}: {source}")]
    Backend {
        /// Generation attempt at which the call failed.
        attempt: u32,
        /// The backend error.
        source: LlmError,
    },

    /// The JSON schema could not be compiled.
    #[error("schema error: {0}")]
    SchemaError(String),
}

impl GenerationError {
    /// Attempt history, empty for non-exhaustion errors.
    #[must_use]
    pub fn history(&self) -> &[AttemptRecord] {
        match self {
            Self::MaxRetriesExceeded { history, .. } => history,
            _ => &[],
        }
    }
}
