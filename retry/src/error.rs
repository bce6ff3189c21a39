//! Error types for retried operations and configuration I/O.

use thiserror::Error;

use crate::attempt::RetryAttempt;

/// Failure of a retried operation, carrying the final error and attempt history.
#[derive(Debug, Error)]
pub enum RetryError<E> {
    /// Every allowed attempt failed with a transient error.
    #[error("operation failed after {attempts} attempts: {last_error}")]
    Exhausted {
        /// Number of attempts made.
        attempts: u32,
        /// The error returned by the final attempt.
        last_error: E,
        /// One record per attempt.
        history: Vec<RetryAttempt>,
    },

    /// An attempt failed with an error classified as non-retryable.
    #[error("operation failed with a non-retryable error at attempt {attempt}: {error}")]
    Fatal {
        /// Attempt at which the fatal error occurred.
        attempt: u32,
        /// The fatal error.
        error: E,
        /// One record per attempt.
        history: Vec<RetryAttempt>,
    },
}

impl<E> RetryError<E> {
    /// Number of attempts consumed.
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        match self {
            Self::Exhausted { attempts, .. } => *attempts,
            Self::Fatal { attempt, .. } => *attempt,
        }
    }

    /// The error of the final attempt.
    #[must_use]
    pub const fn last_error(&self) -> &E {
        match self {
            Self::Exhausted { last_error, .. } => last_error,
            Self::Fatal { error, .. } => error,
        }
    }

    /// Consumes the wrapper and returns the final attempt's error.
    #[must_use]
    pub fn into_inner(self) -> E {
        match self {
            Self::Exhausted { last_error, .. } => last_error,
            Self::Fatal { error, .. } => error,
        }
    }

    /// Attempt records in order.
    #[must_use]
    pub fn history(&self) -> &[RetryAttempt] {
        match self {
            Self::Exhausted { history, .. } | Self::Fatal { history, .. } => history,
        }
    }

    /// Returns `true` if retrying stopped because of a non-retryable error.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal { .. })
    }
}

/// Errors reading or writing the admin retry configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read or written.
    #[error("retry config I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The YAML document is malformed.
    #[error("retry config is not valid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// The JSON document is malformed.
    #[error("retry config is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}
