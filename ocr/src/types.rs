//! OCR operation state and result types.

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

/// Remote status of a submitted OCR operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OperationStatus {
    /// Queued, not yet picked up.
    NotStarted,
    /// Being processed.
    Running,
    /// Finished with results.
    Succeeded,
    /// Finished without results.
    Failed,
}

impl OperationStatus {
    /// Returns `true` once the operation will not change any more.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    /// Status name as reported by the service.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotStarted => "notStarted",
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A submitted operation, owned by the poll loop.
#[derive(Debug, Clone)]
pub struct PollOperation {
    /// Handle returned by submission (the `Operation-Location` URL for Azure).
    pub operation_id: String,
    /// Last status seen.
    pub status: OperationStatus,
    /// When polling started.
    pub started_at: Instant,
    /// Status queries made so far.
    pub poll_count: u32,
}

impl PollOperation {
    /// A freshly submitted operation.
    pub fn new(operation_id: impl Into<String>) -> Self {
        Self {
            operation_id: operation_id.into(),
            status: OperationStatus::NotStarted,
            started_at: Instant::now(),
            poll_count: 0,
        }
    }
}

/// One recognised line of text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextLine {
    /// Line text.
    pub text: String,
    /// Quadrilateral as eight coordinates, clockwise from top-left.
    pub bounding_box: Vec<f64>,
    /// 1-based page number.
    pub bounding_page: u32,
    /// Mean word confidence in `[0, 1]`.
    pub confidence: f64,
}

/// What a status query returned.
#[derive(Debug, Clone, PartialEq)]
pub struct PollResponse {
    /// Remote status.
    pub status: OperationStatus,
    /// Recognised lines, only populated once `status` is `Succeeded`.
    pub lines: Vec<TextLine>,
}

/// How processing a document ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OcrOutcome {
    /// Text was recognised.
    Succeeded,
    /// The service reported failure.
    Failed,
    /// The time budget ran out while the operation was still pending.
    TimedOut,
    /// Submission or a status query failed.
    Errored,
}

/// Result object handed back to callers.
///
/// Serializes to `{text_data, processing_time, overall_confidence}` on success
/// and `{error, text_data: []}` otherwise.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OcrResult {
    /// Recognised lines in page order.
    pub text_data: Vec<TextLine>,
    /// Seconds from submission to completion.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_time: Option<f64>,
    /// Mean line confidence.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overall_confidence: Option<f64>,
    /// Failure description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// How processing ended.
    #[serde(skip)]
    pub outcome: OcrOutcome,
}

impl OcrResult {
    /// A successful result; overall confidence is the mean line confidence.
    #[must_use]
    pub fn success(text_data: Vec<TextLine>, processing_time: f64) -> Self {
        let overall_confidence = if text_data.is_empty() {
            0.0
        } else {
            text_data.iter().map(|line| line.confidence).sum::<f64>() / text_data.len() as f64
        };
        Self {
            text_data,
            processing_time: Some(processing_time),
            overall_confidence: Some(overall_confidence),
            error: None,
            outcome: OcrOutcome::Succeeded,
        }
    }

    /// An error result with no text.
    pub fn failure(outcome: OcrOutcome, error: impl Into<String>) -> Self {
        Self {
            text_data: Vec::new(),
            processing_time: None,
            overall_confidence: None,
            error: Some(error.into()),
            outcome,
        }
    }

    /// Returns `true` if text was recognised.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.outcome == OcrOutcome::Succeeded
    }

    /// All line texts joined with newlines.
    #[must_use]
    pub fn full_text(&self) -> String {
        self.text_data
            .iter()
            .map(|line| line.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}
