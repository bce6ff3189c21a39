//! Metrics and token estimation for generation calls.

use std::time::Duration;

use serde::Serialize;
use tradeflow_recovery::Stage;

/// Metrics collected during a generation call.
#[derive(Debug, Clone, Default, Serialize)]
pub struct GenerationMetrics {
    /// Total number of generation attempts made.
    pub total_attempts: u32,
    /// Wall-clock time elapsed during generation.
    pub wall_time: Duration,
    /// Estimated input tokens sent across all attempts.
    pub estimated_input_tokens: usize,
    /// Estimated output tokens received across all attempts.
    pub estimated_output_tokens: usize,
    /// Recovery stage of the returned reply; `None` if nothing was recovered.
    pub stage: Option<Stage>,
    /// Whether the returned value is a partial result.
    pub partial: bool,
    /// Token limit of the last attempt.
    pub final_max_tokens: u32,
}

/// Estimate token count from text using the 4-chars-per-token heuristic.
///
/// Counts characters, not bytes, and rounds up.
///
/// # Examples
///
/// ```
/// use tradeflow_llm::generation::estimate_tokens;
///
/// assert_eq!(estimate_tokens("hello"), 2);
/// assert_eq!(estimate_tokens("hello world"), 3);
/// ```
#[must_use]
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(4)
}
