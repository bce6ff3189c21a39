//! Configuration for record generation attempts.

use tradeflow_retry::AdminRetryConfig;

/// How many generation attempts to make and what to do when they run out.
///
/// A generation attempt is one completion plus recovery and validation of its
/// reply. Transport failures inside an attempt are retried separately by the
/// completion retry policy.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationConfig {
    /// Maximum number of generation attempts (default: 3).
    pub max_attempts: u32,
    /// Whether to include the full schema in feedback (default: true).
    pub include_schema_in_feedback: bool,
    /// Sampling temperature (default: 0.1).
    pub temperature: f32,
    /// Token limit of the first attempt (default: 2000).
    pub max_tokens: u32,
    /// Highest token limit a truncated reply may raise it to (default: 8000).
    pub max_tokens_ceiling: u32,
    /// Return the best partial result instead of an error when attempts run out.
    pub return_partial_results: bool,
    /// Log every failed attempt at `warn` level.
    pub log_errors: bool,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            include_schema_in_feedback: true,
            temperature: 0.1,
            max_tokens: 2000,
            max_tokens_ceiling: 8000,
            return_partial_results: true,
            log_errors: true,
        }
    }
}

impl GenerationConfig {
    /// Applies the admin retry settings.
    ///
    /// `retry_on_failure = false` limits generation to a single attempt.
    #[must_use]
    pub fn from_admin(admin: &AdminRetryConfig) -> Self {
        Self {
            max_attempts: if admin.retry_on_failure {
                admin.max_retries
            } else {
                1
            },
            return_partial_results: admin.return_partial_results,
            log_errors: admin.log_errors,
            ..Self::default()
        }
    }

    /// Set the maximum number of generation attempts (at least one).
    #[must_use]
    pub fn with_max_attempts(mut self, max: u32) -> Self {
        self.max_attempts = max.max(1);
        self
    }

    /// Set whether to include the schema in feedback.
    #[must_use]
    pub const fn with_schema_in_feedback(mut self, include: bool) -> Self {
        self.include_schema_in_feedback = include;
        self
    }

    /// Set the sampling temperature.
    #[must_use]
    pub const fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set the initial token limit and its ceiling.
    #[must_use]
    pub fn with_max_tokens(mut self, initial: u32, ceiling: u32) -> Self {
        self.max_tokens = initial;
        self.max_tokens_ceiling = ceiling.max(initial);
        self
    }

    /// Set whether partial results are returned when attempts run out.
    #[must_use]
    pub const fn with_partial_results(mut self, enabled: bool) -> Self {
        self.return_partial_results = enabled;
        self
    }

    /// Set whether failed attempts are logged.
    #[must_use]
    pub const fn with_error_logging(mut self, enabled: bool) -> Self {
        self.log_errors = enabled;
        self
    }

    /// Token limit after a truncated reply: 50% more, up to the ceiling.
    #[must_use]
    pub fn grown_max_tokens(&self, current: u32) -> u32 {
        current
            .saturating_add(current.div_ceil(2))
            .min(self.max_tokens_ceiling)
            .max(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_admin() {
        let admin = AdminRetryConfig {
            max_retries: 5,
            return_partial_results: false,
            ..AdminRetryConfig::default()
        };
        let config = GenerationConfig::from_admin(&admin);
        assert_eq!(config.max_attempts, 5);
        assert!(!config.return_partial_results);

        let disabled = AdminRetryConfig {
            retry_on_failure: false,
            ..admin
        };
        assert_eq!(GenerationConfig::from_admin(&disabled).max_attempts, 1);
    }

    #[test]
    fn test_token_growth_capped() {
        let config = GenerationConfig::default().with_max_tokens(2000, 4000);
        assert_eq!(config.grown_max_tokens(2000), 3000);
        assert_eq!(config.grown_max_tokens(3000), 4000);
        assert_eq!(config.grown_max_tokens(4000), 4000);
    }

    #[test]
    fn test_max_attempts_at_least_one() {
        assert_eq!(GenerationConfig::default().with_max_attempts(0).max_attempts, 1);
    }
}
