//! Bounded retry with exponential backoff for unreliable remote calls.
//!
//! The retry loop classifies each failure as transient or fatal: transient
//! failures are retried under a [`RetryPolicy`] until its attempt budget is
//! spent, fatal failures end the loop immediately. Policies come from an
//! admin-editable file ([`AdminRetryConfig`]) cached process-wide in
//! [`RetryConfigCache`], or are passed explicitly per call.
//!
//! ```no_run
//! use tradeflow_retry::{with_retry, RetryPolicy};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let policy = RetryPolicy::new(5, Duration::from_millis(500));
//! let body = with_retry(
//!     || async { std::fs::read_to_string("/tmp/reply.json") },
//!     Some(policy),
//!     None,
//! )
//! .await?;
//! # drop(body);
//! # Ok(())
//! # }
//! ```

pub mod attempt;
pub mod classify;
pub mod config;
pub mod controller;
pub mod error;
pub mod policy;
pub mod progress;

pub use attempt::{AttemptOutcome, RetryAttempt};
pub use classify::{is_transient_status, Transience};
pub use config::{AdminRetryConfig, RetryConfigCache, CONFIG_ENV_VAR};
pub use controller::{with_retry, Retry};
pub use error::{ConfigError, RetryError};
pub use policy::RetryPolicy;
pub use progress::{ChannelSink, NullSink, ProgressEvent, ProgressReporter, ProgressSink};
