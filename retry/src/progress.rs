//! Progress events for long-running operations.
//!
//! The core never owns the notification channel; it only calls
//! [`ProgressSink::emit`] with a client id and an event.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::attempt::{AttemptOutcome, RetryAttempt};

/// A single progress notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// Pipeline stage, e.g. `ocr` or `llm_retry`.
    pub stage: String,
    /// Human-readable status line.
    pub message: String,
    /// Completion estimate in `[0, 100]`.
    pub progress_percent: u8,
}

impl ProgressEvent {
    /// Creates an event, capping the percentage at 100.
    #[must_use]
    pub fn new(stage: impl Into<String>, message: impl Into<String>, progress_percent: u8) -> Self {
        Self {
            stage: stage.into(),
            message: message.into(),
            progress_percent: progress_percent.min(100),
        }
    }

    /// Describes a retry attempt, with progress proportional to attempts consumed.
    #[must_use]
    pub fn for_attempt(stage: impl Into<String>, attempt: &RetryAttempt) -> Self {
        let percent = match attempt.outcome {
            AttemptOutcome::Success => 100,
            _ => {
                let max = u64::from(attempt.max_attempts.max(1));
                let done = u64::from(attempt.attempt_number).min(max);
                u8::try_from(done * 100 / max).unwrap_or(100)
            }
        };
        Self::new(stage, attempt.summary(), percent)
    }
}

/// Destination for progress events.
pub trait ProgressSink: Send + Sync {
    /// Pushes `event` to the session identified by `client_id`.
    fn emit(&self, client_id: &str, event: ProgressEvent);
}

/// Sink that discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl ProgressSink for NullSink {
    fn emit(&self, _client_id: &str, _event: ProgressEvent) {}
}

/// Sink that forwards events into an unbounded tokio channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    sender: mpsc::UnboundedSender<(String, ProgressEvent)>,
}

impl ChannelSink {
    /// Creates a sink and the receiver that drains it.
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<(String, ProgressEvent)>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl ProgressSink for ChannelSink {
    fn emit(&self, client_id: &str, event: ProgressEvent) {
        if self.sender.send((client_id.to_owned(), event)).is_err() {
            tracing::trace!(client_id, "progress receiver dropped");
        }
    }
}

/// A sink bound to one client id.
#[derive(Clone)]
pub struct ProgressReporter {
    sink: Arc<dyn ProgressSink>,
    client_id: String,
}

impl std::fmt::Debug for ProgressReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressReporter")
            .field("client_id", &self.client_id)
            .finish_non_exhaustive()
    }
}

impl ProgressReporter {
    /// Binds `sink` to `client_id`.
    pub fn new(sink: Arc<dyn ProgressSink>, client_id: impl Into<String>) -> Self {
        Self {
            sink,
            client_id: client_id.into(),
        }
    }

    /// A reporter that drops every event.
    #[must_use]
    pub fn disabled() -> Self {
        Self::new(Arc::new(NullSink), "")
    }

    /// The client this reporter pushes to.
    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Emits a pre-built event.
    pub fn emit(&self, event: ProgressEvent) {
        self.sink.emit(&self.client_id, event);
    }

    /// Emits an event from its parts.
    pub fn report(&self, stage: &str, message: impl Into<String>, progress_percent: u8) {
        self.emit(ProgressEvent::new(stage, message, progress_percent));
    }

    /// Emits an event describing a retry attempt.
    pub fn attempt(&self, stage: &str, attempt: &RetryAttempt) {
        self.emit(ProgressEvent::for_attempt(stage, attempt));
    }
}
