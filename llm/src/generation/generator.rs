//! Retry loop that turns completions into validated records.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tokio::time::Instant;
use tradeflow_recovery::{recover_array, recover_object, Recovered, Stage};
use tradeflow_retry::{ProgressReporter, RetryPolicy};

use super::config::GenerationConfig;
use super::error::{AttemptRecord, GenerationError};
use super::feedback::{
    build_recovery_feedback, build_truncation_feedback, build_validation_feedback,
    collect_record_errors, collect_validation_errors,
};
use super::metrics::{estimate_tokens, GenerationMetrics};
use crate::backend::CompletionBackend;
use crate::retrying::RetryingBackend;
use crate::types::CompletionRequest;

const PROGRESS_STAGE: &str = "llm_generation";

/// A generated value with the metrics of the call that produced it.
#[derive(Debug, Clone)]
pub struct Generated<T> {
    /// The records or object.
    pub value: T,
    /// Attempts, timing and recovery details.
    pub metrics: GenerationMetrics,
}

/// Shapes a reply can be recovered into.
trait Shape: Sized {
    fn recover(raw: &str) -> Recovered<Self>;
    fn is_empty(&self) -> bool;
    fn weight(&self) -> usize;
    /// The part that passes validation, and the errors of the rest.
    fn validate(self, validator: &jsonschema::Validator) -> (Self, Vec<String>);
    fn to_value(&self) -> Value;
}

impl Shape for Vec<Value> {
    fn recover(raw: &str) -> Recovered<Self> {
        recover_array(raw)
    }

    fn is_empty(&self) -> bool {
        self.is_empty()
    }

    fn weight(&self) -> usize {
        self.len()
    }

    fn validate(self, validator: &jsonschema::Validator) -> (Self, Vec<String>) {
        let errors = collect_record_errors(validator, &self);
        if errors.is_empty() {
            return (self, errors);
        }
        let valid = self.into_iter().filter(|record| validator.is_valid(record)).collect();
        (valid, errors)
    }

    fn to_value(&self) -> Value {
        Value::Array(self.clone())
    }
}

impl Shape for Map<String, Value> {
    fn recover(raw: &str) -> Recovered<Self> {
        recover_object(raw)
    }

    fn is_empty(&self) -> bool {
        self.is_empty()
    }

    fn weight(&self) -> usize {
        self.len()
    }

    fn validate(self, validator: &jsonschema::Validator) -> (Self, Vec<String>) {
        let errors = collect_validation_errors(validator, &self.to_value());
        if errors.is_empty() {
            (self, errors)
        } else {
            (Self::new(), errors)
        }
    }

    fn to_value(&self) -> Value {
        Value::Object(self.clone())
    }
}

struct CompiledSchema {
    schema: Value,
    validator: jsonschema::Validator,
}

/// Generates structured records from an LLM, surviving malformed replies.
///
/// Each attempt sends one completion (itself retried on transient transport
/// errors), recovers JSON from the reply and optionally validates it against a
/// schema. Empty, invalid or truncated results trigger another attempt with
/// feedback appended to the prompt; a reply cut off by the token limit raises
/// the limit for the next attempt.
pub struct RecordGenerator {
    backend: RetryingBackend<Arc<dyn CompletionBackend>>,
    config: GenerationConfig,
    schema: Option<CompiledSchema>,
    progress: ProgressReporter,
}

impl std::fmt::Debug for RecordGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordGenerator")
            .field("backend", &self.backend.name())
            .field("config", &self.config)
            .field("completion_policy", &self.backend.policy())
            .field("schema", &self.schema.as_ref().map(|s| &s.schema))
            .finish_non_exhaustive()
    }
}

struct Tally {
    start: Instant,
    input_tokens: usize,
    output_tokens: usize,
}

impl Tally {
    fn metrics(&self, attempts: u32, stage: Option<Stage>, partial: bool, max_tokens: u32) -> GenerationMetrics {
        GenerationMetrics {
            total_attempts: attempts,
            wall_time: self.start.elapsed(),
            estimated_input_tokens: self.input_tokens,
            estimated_output_tokens: self.output_tokens,
            stage,
            partial,
            final_max_tokens: max_tokens,
        }
    }
}

fn percent(done: u32, total: u32) -> u8 {
    u8::try_from(u64::from(done) * 100 / u64::from(total.max(1))).unwrap_or(100)
}

impl RecordGenerator {
    /// Creates a generator with the default configuration.
    #[must_use]
    pub fn new(backend: Arc<dyn CompletionBackend>) -> Self {
        Self::with_config(backend, GenerationConfig::default())
    }

    /// Creates a generator with the given configuration.
    #[must_use]
    pub fn with_config(backend: Arc<dyn CompletionBackend>, config: GenerationConfig) -> Self {
        Self {
            backend: RetryingBackend::new(backend),
            config,
            schema: None,
            progress: ProgressReporter::disabled(),
        }
    }

    /// Validates every record (or the object) against `schema`.
    pub fn with_schema(mut self, schema: Value) -> Result<Self, GenerationError> {
        let validator = jsonschema::Validator::new(&schema)
            .map_err(|e| GenerationError::SchemaError(e.to_string()))?;
        self.schema = Some(CompiledSchema { schema, validator });
        Ok(self)
    }

    /// Retries each completion under `policy` instead of the admin policy.
    #[must_use]
    pub fn with_completion_policy(mut self, policy: RetryPolicy) -> Self {
        self.backend = self.backend.with_policy(policy);
        self
    }

    /// Pushes progress events for attempts and completion retries.
    #[must_use]
    pub fn with_progress(mut self, progress: ProgressReporter) -> Self {
        self.backend = self.backend.with_progress(progress.clone());
        self.progress = progress;
        self
    }

    /// The generation settings.
    #[must_use]
    pub const fn config(&self) -> &GenerationConfig {
        &self.config
    }

    /// Generates a list of records.
    ///
    /// # Errors
    ///
    /// Returns [`GenerationError::MaxRetriesExceeded`] when no attempt produced
    /// a complete valid list and partial results are disabled (or there are
    /// none), and [`GenerationError::Backend`] when a completion call fails
    /// after its retries.
    pub async fn generate_records(
        &self,
        system: &str,
        prompt: &str,
    ) -> Result<Generated<Vec<Value>>, GenerationError> {
        self.run(system, prompt).await
    }

    /// Generates a single object.
    ///
    /// # Errors
    ///
    /// See [`generate_records`](Self::generate_records).
    pub async fn generate_object(
        &self,
        system: &str,
        prompt: &str,
    ) -> Result<Generated<Map<String, Value>>, GenerationError> {
        self.run(system, prompt).await
    }

    /// Generates records and deserializes each into `T`.
    ///
    /// Records that do not deserialize are dropped and logged.
    ///
    /// # Errors
    ///
    /// See [`generate_records`](Self::generate_records).
    pub async fn generate_typed<T: DeserializeOwned>(
        &self,
        system: &str,
        prompt: &str,
    ) -> Result<Generated<Vec<T>>, GenerationError> {
        let Generated { value, metrics } = self.generate_records(system, prompt).await?;
        let typed = value
            .into_iter()
            .enumerate()
            .filter_map(|(index, record)| match serde_json::from_value(record) {
                Ok(item) => Some(item),
                Err(e) => {
                    tracing::warn!(index, error = %e, "dropping record that does not fit the target type");
                    None
                }
            })
            .collect();
        Ok(Generated { value: typed, metrics })
    }

    #[allow(clippy::too_many_lines)]
    async fn run<S: Shape>(&self, system: &str, prompt: &str) -> Result<Generated<S>, GenerationError> {
        let max_attempts = self.config.max_attempts.max(1);
        let schema = self.schema.as_ref();
        let schema_in_feedback = schema
            .filter(|_| self.config.include_schema_in_feedback)
            .map(|s| &s.schema);

        let mut tally = Tally {
            start: Instant::now(),
            input_tokens: 0,
            output_tokens: 0,
        };
        let mut history: Vec<AttemptRecord> = Vec::new();
        let mut best: Option<(S, Option<Stage>)> = None;
        let mut current_prompt = prompt.to_owned();
        let mut max_tokens = self.config.max_tokens;
        let mut last_raw = String::new();

        for attempt in 1..=max_attempts {
            self.progress.report(
                PROGRESS_STAGE,
                format!("generation attempt {attempt}/{max_attempts}"),
                percent(attempt - 1, max_attempts),
            );

            let request = CompletionRequest::prompt(system, current_prompt.as_str())
                .with_temperature(self.config.temperature)
                .with_max_tokens(max_tokens);
            tally.input_tokens += estimate_tokens(system) + estimate_tokens(&current_prompt);

            let completion = match self.backend.complete(&request).await {
                Ok(completion) => completion,
                Err(source) => {
                    if self.config.log_errors {
                        tracing::warn!(attempt, error = %source, "completion failed");
                    }
                    if self.config.return_partial_results {
                        if let Some((value, stage)) = best.take() {
                            let metrics = tally.metrics(attempt, stage, true, max_tokens);
                            return Ok(Generated { value, metrics });
                        }
                    }
                    return Err(GenerationError::Backend { attempt, source });
                }
            };
            tally.output_tokens += estimate_tokens(&completion.content);

            let Recovered { value, stage } = S::recover(&completion.content);
            let submitted = value.to_value();
            let truncated = completion.hit_token_limit()
                || (completion.finish_reason.is_none() && stage.is_some_and(Stage::suggests_truncation));

            let (errors, feedback) = if value.is_empty() {
                let reason = "no JSON could be recovered";
                let feedback = build_recovery_feedback(
                    &completion.content,
                    reason,
                    attempt,
                    max_attempts,
                    schema_in_feedback,
                );
                (vec![reason.to_owned()], feedback)
            } else {
                let (valid, errors) = match schema {
                    Some(schema) => value.validate(&schema.validator),
                    None => (value, Vec::new()),
                };

                if errors.is_empty() && !truncated {
                    tracing::debug!(attempt, ?stage, "generation accepted");
                    self.progress.report(PROGRESS_STAGE, "generation complete", 100);
                    let metrics = tally.metrics(attempt, stage, false, max_tokens);
                    return Ok(Generated { value: valid, metrics });
                }

                if !valid.is_empty() && best.as_ref().map_or(true, |(b, _)| valid.weight() > b.weight()) {
                    best = Some((valid, stage));
                }

                if errors.is_empty() {
                    let kept = best.as_ref().map_or(0, |(b, _)| b.weight());
                    let feedback = build_truncation_feedback(kept, attempt, max_attempts);
                    (vec!["reply truncated by the token limit".to_owned()], feedback)
                } else {
                    let feedback = build_validation_feedback(
                        schema_in_feedback,
                        &submitted,
                        &errors,
                        attempt,
                        max_attempts,
                    );
                    (errors, feedback)
                }
            };

            if self.config.log_errors {
                tracing::warn!(
                    attempt,
                    max_attempts,
                    stage = stage.map_or("none", Stage::as_str),
                    truncated,
                    first_error = errors.first().map_or("", String::as_str),
                    "generation attempt rejected"
                );
            } else {
                tracing::debug!(attempt, truncated, "generation attempt rejected");
            }

            history.push(AttemptRecord {
                attempt_number: attempt,
                recovered: submitted,
                stage,
                errors,
                raw_output: completion.content.clone(),
                elapsed: tally.start.elapsed(),
            });

            if truncated {
                let grown = self.config.grown_max_tokens(max_tokens);
                if grown > max_tokens {
                    tracing::debug!(from = max_tokens, to = grown, "raising token limit after truncation");
                }
                max_tokens = grown;
            }
            current_prompt = format!("{current_prompt}\n\n{feedback}");
            last_raw = completion.content;
        }

        if self.config.return_partial_results {
            if let Some((value, stage)) = best {
                tracing::info!(attempts = max_attempts, "returning partial result");
                self.progress.report(PROGRESS_STAGE, "returning partial result", 100);
                let metrics = tally.metrics(max_attempts, stage, true, max_tokens);
                return Ok(Generated { value, metrics });
            }
        }

        let metrics = tally.metrics(max_attempts, None, false, max_tokens);
        Err(GenerationError::MaxRetriesExceeded {
            attempts: max_attempts,
            max_attempts,
            history,
            raw_output: last_raw,
            metrics,
        })
    }
}
