//! Adaptive polling for asynchronous OCR services.
//!
//! A document is submitted once, then its operation is polled on a schedule
//! that starts fast and relaxes over time, until the service reports a
//! terminal status or the document's time budget runs out:
//!
//! ```text
//! NotStarted -> Running -> Succeeded | Failed | TimedOut
//! ```
//!
//! Only `Succeeded` yields text; every other ending yields an [`OcrResult`]
//! with an `error` and no text. Submission and each status query run under
//! the retry controller from `tradeflow-retry`.

pub mod client;
pub mod error;
pub mod pipeline;
pub mod poller;
pub mod schedule;
pub mod types;

pub use client::{parse_read_result, AzureReadClient, AzureVisionSettings, OcrService};
pub use error::OcrError;
pub use pipeline::OcrPipeline;
pub use poller::{AdaptivePoller, PollOutcome};
pub use schedule::{PollSchedule, TimeoutBudget};
pub use types::{OcrOutcome, OcrResult, OperationStatus, PollOperation, PollResponse, TextLine};
