//! Schema-checked record generation with retry and feedback.
//!
//! - [`RecordGenerator`] - generation loop over a completion backend
//! - [`GenerationError`] - typed error enum with attempt history
//! - [`GenerationMetrics`] - attempts, timing, token estimates, recovery stage
//! - [`GenerationConfig`] - attempt budget and partial-result behaviour

pub mod config;
pub mod error;
pub mod feedback;
pub mod generator;
pub mod metrics;

pub use config::GenerationConfig;
pub use error::{AttemptRecord, GenerationError};
pub use feedback::{build_recovery_feedback, build_truncation_feedback, build_validation_feedback};
pub use generator::{Generated, RecordGenerator};
pub use metrics::{estimate_tokens, GenerationMetrics};
