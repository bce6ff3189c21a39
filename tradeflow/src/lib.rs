//! # tradeflow
//!
//! Resilient LLM and OCR plumbing for a trade-finance assistant.
//!
//! This crate ties together the workspace's building blocks:
//!
//! - `tradeflow-recovery`: salvage JSON records from messy model replies
//! - `tradeflow-retry`: bounded backoff under an admin-editable policy
//! - `tradeflow-llm`: completion backends and validated record generation
//! - `tradeflow-ocr`: adaptive polling of asynchronous OCR operations
//!
//! ## Example
//!
//! ```no_run
//! # use tradeflow::prelude::*;
//! # async fn example() -> Result<(), Error> {
//! let assistant = Assistant::new(AppConfig::from_env());
//!
//! let records = assistant
//!     .generator()?
//!     .generate_records("Extract every letter of credit as JSON.", "...")
//!     .await?;
//! println!("{} records in {} attempts", records.value.len(), records.metrics.total_attempts);
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]

/// Component wiring.
pub mod assistant;

/// Subcommand implementations for the `tradeflow` binary.
pub mod commands;

/// Application configuration.
pub mod config;

/// Public error types.
pub mod errors;

/// Commonly used types and traits.
pub mod prelude;
